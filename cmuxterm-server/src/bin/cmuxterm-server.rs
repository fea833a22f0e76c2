//! Headless control-plane server.
//!
//! The real app embeds the server inside the GUI shell; this binary runs
//! the same stack without a host, which is handy for development and for
//! driving the CLI end to end.

use cmuxterm_server::{Listener, Server};
use mux::Mux;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = config::configuration();
    let mux = Arc::new(Mux::new());
    Mux::set_mux(&mux);
    mux.new_window();

    let server = Arc::new(Server::new(&mux, cfg.access_mode));
    let mut listener = Listener::bind(&cfg.socket_path)?;
    log::info!("listening on {}", listener.local_path().display());
    listener.run(server);
    Ok(())
}
