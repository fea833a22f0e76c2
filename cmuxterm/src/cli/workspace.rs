use super::Ctx;
use clap::Parser;
use serde_json::json;

#[derive(Debug, Parser)]
pub struct NewWorkspace {
    /// Window to create the workspace in (default: key window)
    #[arg(long = "in-window")]
    in_window: Option<String>,

    /// Title for the new workspace
    #[arg(long = "title")]
    title: Option<String>,
}

impl NewWorkspace {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(window) = &self.in_window {
            params["window_id"] = json!(window);
        }
        if let Some(title) = &self.title {
            params["title"] = json!(title);
        }
        let result = ctx.client.call_ok("workspace.new", params)?;
        let pretty = format!("OK {}", result["workspace_id"].as_str().unwrap_or("?"));
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct SelectWorkspace {
    /// Workspace handle (uuid, workspace:N or index)
    workspace: String,
}

impl SelectWorkspace {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx
            .client
            .call_ok("workspace.select", json!({ "workspace_id": self.workspace }))?;
        ctx.print_value(result, "OK")
    }
}

#[derive(Debug, Parser)]
pub struct CloseWorkspace {
    /// Workspace handle (default: current)
    #[arg(long = "workspace")]
    workspace: Option<String>,
}

impl CloseWorkspace {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(workspace) = &self.workspace {
            params["workspace_id"] = json!(workspace);
        }
        let result = ctx.client.call_ok("workspace.close", params)?;
        ctx.print_value(result, "OK")
    }
}

#[derive(Debug, Parser)]
pub struct ReorderWorkspace {
    /// Workspace handle (default: current)
    #[arg(long = "workspace")]
    workspace: Option<String>,

    /// New 0-based index in the window's workspace list
    #[arg(long = "index")]
    index: Option<usize>,

    /// Place before this workspace
    #[arg(long = "before")]
    before: Option<String>,

    /// Place after this workspace
    #[arg(long = "after")]
    after: Option<String>,
}

impl ReorderWorkspace {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(workspace) = &self.workspace {
            params["workspace_id"] = json!(workspace);
        }
        if let Some(index) = self.index {
            params["index"] = json!(index);
        }
        if let Some(before) = &self.before {
            params["before"] = json!(before);
        }
        if let Some(after) = &self.after {
            params["after"] = json!(after);
        }
        let result = ctx.client.call_ok("workspace.reorder", params)?;
        let pretty = format!("OK index {}", result["index"].as_u64().unwrap_or(0));
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct MoveWorkspaceToWindow {
    /// Workspace to move
    workspace: String,
    /// Destination window
    window: String,
}

impl MoveWorkspaceToWindow {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx.client.call_ok(
            "workspace.move_to_window",
            json!({ "workspace_id": self.workspace, "window_id": self.window }),
        )?;
        ctx.print_value(result, "OK")
    }
}
