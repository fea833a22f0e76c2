use clap::Parser;
use cmuxterm_client::IdFormat;
use std::path::PathBuf;

mod cli;

/// Control cmuxterm from the command line.
#[derive(Debug, Parser)]
#[command(name = "cmux", version, about)]
pub struct Opt {
    /// Path to the control socket (default: $CMUX_SOCKET_PATH or
    /// /tmp/cmux.sock)
    #[arg(long = "socket", global = true)]
    socket: Option<PathBuf>,

    /// Emit canonical JSON instead of pretty output
    #[arg(long = "json", global = true)]
    json: bool,

    /// How entity identifiers are rendered in JSON output:
    /// "refs", "uuids" or "both"
    #[arg(long = "id-format", global = true, default_value = "refs")]
    id_format: IdFormat,

    /// Focus this window first, so routing commands hit it
    #[arg(long = "window", global = true)]
    window: Option<String>,

    #[command(subcommand)]
    cmd: cli::CliSubCommand,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opt = Opt::parse();
    if let Err(err) = cli::run(opt) {
        terminate_with_error(err);
    }
}

fn terminate_with_error(err: anyhow::Error) -> ! {
    eprintln!("Error: {:#}", err);
    std::process::exit(1);
}
