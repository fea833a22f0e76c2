use crate::Opt;
use anyhow::Context as _;
use clap::Parser;
use cmuxterm_client::{Client, IdFormat};
use serde_json::{json, Value};

mod browser;
mod claude_hook;
mod list;
mod notify;
mod send;
mod status;
mod surface;
mod system;
mod window;
mod workspace;

/// Shared state handed to every subcommand.
pub struct Ctx {
    pub client: Client,
    pub json: bool,
    pub id_format: IdFormat,
}

impl Ctx {
    /// Emit a result: canonical JSON when `--json`, else the pretty text.
    pub fn print_value(&self, value: Value, pretty: &str) -> anyhow::Result<()> {
        if self.json {
            let value = self.id_format.rewritten(value);
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("encoding output")?
            );
        } else if !pretty.is_empty() {
            println!("{}", pretty);
        }
        Ok(())
    }

    /// Print a raw v1 response as-is.
    pub fn print_raw(&self, response: &str) -> anyhow::Result<()> {
        if response.starts_with("ERROR: ") {
            anyhow::bail!("{}", &response["ERROR: ".len()..]);
        }
        if self.json {
            self.print_value(json!({ "response": response }), "")
        } else {
            println!("{}", response);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
pub enum CliSubCommand {
    /// Check that the app is reachable
    #[command(name = "ping")]
    Ping,

    /// Show the focused window/workspace/pane/surface
    #[command(name = "identify")]
    Identify(system::Identify),

    /// List the server's protocols and methods
    #[command(name = "capabilities")]
    Capabilities(system::Capabilities),

    #[command(name = "list-windows", about = "List windows")]
    ListWindows(list::ListWindows),

    #[command(name = "new-window", about = "Create a window")]
    NewWindow(window::NewWindow),

    #[command(name = "focus-window", about = "Focus (make key) a window")]
    FocusWindow(window::FocusWindow),

    #[command(name = "close-window", about = "Close a window")]
    CloseWindow(window::CloseWindow),

    #[command(name = "list-workspaces", about = "List workspaces")]
    ListWorkspaces(list::ListWorkspaces),

    #[command(name = "new-workspace", about = "Create a workspace")]
    NewWorkspace(workspace::NewWorkspace),

    #[command(name = "select-workspace", about = "Select a workspace")]
    SelectWorkspace(workspace::SelectWorkspace),

    #[command(name = "close-workspace", about = "Close a workspace")]
    CloseWorkspace(workspace::CloseWorkspace),

    #[command(name = "reorder-workspace", about = "Move a workspace within its window")]
    ReorderWorkspace(workspace::ReorderWorkspace),

    #[command(
        name = "move-workspace-to-window",
        about = "Move a workspace to another window"
    )]
    MoveWorkspaceToWindow(workspace::MoveWorkspaceToWindow),

    #[command(name = "list-panes", about = "List panes of a workspace")]
    ListPanes(list::ListPanes),

    #[command(name = "focus-pane", about = "Focus a pane")]
    FocusPane(surface::FocusPane),

    #[command(name = "list-surfaces", about = "List surfaces of a workspace")]
    ListSurfaces(list::ListSurfaces),

    #[command(name = "list-pane-surfaces", about = "List the surfaces of one pane")]
    ListPaneSurfaces(list::ListPaneSurfaces),

    #[command(name = "new-surface", about = "Create a surface (tab) in a pane")]
    NewSurface(surface::NewSurface),

    #[command(name = "close-surface", about = "Close a surface")]
    CloseSurface(surface::CloseSurface),

    #[command(name = "focus-surface", about = "Focus a surface")]
    FocusSurface(surface::FocusSurface),

    #[command(name = "reorder-surface", about = "Move a surface within its pane")]
    ReorderSurface(surface::ReorderSurface),

    #[command(name = "move-surface", about = "Move a surface to another pane")]
    MoveSurface(surface::MoveSurface),

    #[command(name = "new-split", about = "Split the focused pane")]
    NewSplit(surface::NewSplit),

    #[command(
        name = "drag-surface-to-split",
        about = "Move a surface into a new pane at the workspace edge"
    )]
    DragSurfaceToSplit(surface::DragSurfaceToSplit),

    #[command(name = "send", about = "Send text to a terminal surface")]
    Send(send::Send),

    #[command(name = "send-key", about = "Send a key chord to a terminal surface")]
    SendKey(send::SendKey),

    #[command(name = "notify", about = "Post a workspace notification")]
    Notify(notify::Notify),

    #[command(name = "list-notifications", about = "List notifications")]
    ListNotifications(notify::ListNotifications),

    #[command(name = "clear-notifications", about = "Clear all notifications")]
    ClearNotifications(notify::ClearNotifications),

    #[command(name = "set-status", about = "Set a workspace status indicator")]
    SetStatus(status::SetStatus),

    #[command(name = "clear-status", about = "Clear a workspace status indicator")]
    ClearStatus(status::ClearStatus),

    #[command(name = "set-app-focus", about = "Override the app focus state")]
    SetAppFocus(status::SetAppFocus),

    /// Drive the browser surface
    #[command(subcommand, name = "browser")]
    Browser(browser::BrowserCommand),

    /// Claude lifecycle hooks (read the hook JSON from stdin)
    #[command(subcommand, name = "claude-hook")]
    ClaudeHook(claude_hook::ClaudeHookCommand),
}

pub fn run(opt: Opt) -> anyhow::Result<()> {
    // The claude hooks must not hard-fail when the app is down; they
    // manage the session store regardless and suppress RPC errors.
    if let CliSubCommand::ClaudeHook(cmd) = &opt.cmd {
        return claude_hook::run(cmd, &opt);
    }

    let mut ctx = connect(&opt)?;
    if let Some(window) = &opt.window {
        // a bare integer means the short ref, not a listing index
        let window = if window.chars().all(|c| c.is_ascii_digit()) {
            format!("window:{}", window)
        } else {
            window.clone()
        };
        ctx.client
            .call_ok("window.focus", json!({ "window_id": window }))
            .context("focusing --window")?;
    }

    match opt.cmd {
        CliSubCommand::Ping => {
            let response = ctx.client.send_line("ping")?;
            ctx.print_raw(&response)
        }
        CliSubCommand::Identify(cmd) => cmd.run(&mut ctx),
        CliSubCommand::Capabilities(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ListWindows(cmd) => cmd.run(&mut ctx),
        CliSubCommand::NewWindow(cmd) => cmd.run(&mut ctx),
        CliSubCommand::FocusWindow(cmd) => cmd.run(&mut ctx),
        CliSubCommand::CloseWindow(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ListWorkspaces(cmd) => cmd.run(&mut ctx),
        CliSubCommand::NewWorkspace(cmd) => cmd.run(&mut ctx),
        CliSubCommand::SelectWorkspace(cmd) => cmd.run(&mut ctx),
        CliSubCommand::CloseWorkspace(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ReorderWorkspace(cmd) => cmd.run(&mut ctx),
        CliSubCommand::MoveWorkspaceToWindow(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ListPanes(cmd) => cmd.run(&mut ctx),
        CliSubCommand::FocusPane(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ListSurfaces(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ListPaneSurfaces(cmd) => cmd.run(&mut ctx),
        CliSubCommand::NewSurface(cmd) => cmd.run(&mut ctx),
        CliSubCommand::CloseSurface(cmd) => cmd.run(&mut ctx),
        CliSubCommand::FocusSurface(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ReorderSurface(cmd) => cmd.run(&mut ctx),
        CliSubCommand::MoveSurface(cmd) => cmd.run(&mut ctx),
        CliSubCommand::NewSplit(cmd) => cmd.run(&mut ctx),
        CliSubCommand::DragSurfaceToSplit(cmd) => cmd.run(&mut ctx),
        CliSubCommand::Send(cmd) => cmd.run(&mut ctx),
        CliSubCommand::SendKey(cmd) => cmd.run(&mut ctx),
        CliSubCommand::Notify(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ListNotifications(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ClearNotifications(cmd) => cmd.run(&mut ctx),
        CliSubCommand::SetStatus(cmd) => cmd.run(&mut ctx),
        CliSubCommand::ClearStatus(cmd) => cmd.run(&mut ctx),
        CliSubCommand::SetAppFocus(cmd) => cmd.run(&mut ctx),
        CliSubCommand::Browser(cmd) => browser::run(cmd, &mut ctx),
        CliSubCommand::ClaudeHook(_) => unreachable!("handled above"),
    }
}

pub fn connect(opt: &Opt) -> anyhow::Result<Ctx> {
    let cfg = config::configuration();
    let path = opt.socket.clone().unwrap_or_else(|| cfg.socket_path.clone());
    let client = Client::connect(&path, cfg.cli_response_timeout)?;
    Ok(Ctx {
        client,
        json: opt.json,
        id_format: opt.id_format,
    })
}
