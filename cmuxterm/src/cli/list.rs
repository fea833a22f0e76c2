use super::Ctx;
use clap::Parser;
use serde_json::{json, Value};

fn star(flag: bool) -> &'static str {
    if flag {
        "*"
    } else {
        " "
    }
}

#[derive(Debug, Parser)]
pub struct ListWindows {}

impl ListWindows {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx.client.call_ok("window.list", json!({}))?;
        let windows = result.as_array().cloned().unwrap_or_default();
        let pretty = if windows.is_empty() {
            "No windows".to_string()
        } else {
            windows
                .iter()
                .enumerate()
                .map(|(idx, w)| {
                    format!(
                        "{} {}: {} [{} workspaces]",
                        star(w["is_key"].as_bool().unwrap_or(false)),
                        idx,
                        w["window_ref"].as_str().unwrap_or("?"),
                        w["workspace_count"].as_u64().unwrap_or(0),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct ListWorkspaces {
    /// Restrict the listing to one window
    #[arg(long = "in-window")]
    in_window: Option<String>,
}

impl ListWorkspaces {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(window) = &self.in_window {
            params["window_id"] = json!(window);
        }
        let result = ctx.client.call_ok("workspace.list", params)?;
        let workspaces = result.as_array().cloned().unwrap_or_default();
        let pretty = if workspaces.is_empty() {
            "No workspaces".to_string()
        } else {
            workspaces
                .iter()
                .enumerate()
                .map(|(idx, ws)| {
                    format!(
                        "{} {}: {} {}",
                        star(ws["is_selected"].as_bool().unwrap_or(false)),
                        idx,
                        ws["workspace_ref"].as_str().unwrap_or("?"),
                        ws["title"].as_str().unwrap_or(""),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct ListPanes {
    /// Workspace to list (default: current)
    #[arg(long = "workspace")]
    workspace: Option<String>,
}

impl ListPanes {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(workspace) = &self.workspace {
            params["workspace_id"] = json!(workspace);
        }
        let result = ctx.client.call_ok("pane.list", params)?;
        let panes = result.as_array().cloned().unwrap_or_default();
        let pretty = if panes.is_empty() {
            "No panes".to_string()
        } else {
            panes
                .iter()
                .enumerate()
                .map(|(idx, p)| {
                    format!(
                        "{} {}: {} [{} tabs]",
                        star(p["is_focused"].as_bool().unwrap_or(false)),
                        idx,
                        p["pane_ref"].as_str().unwrap_or("?"),
                        p["surface_count"].as_u64().unwrap_or(0),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        ctx.print_value(result, &pretty)
    }
}

pub fn render_surfaces(surfaces: &[Value]) -> String {
    if surfaces.is_empty() {
        return "No surfaces".to_string();
    }
    surfaces
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            format!(
                "{} {}: {} {} ({})",
                star(s["is_selected"].as_bool().unwrap_or(false)),
                idx,
                s["surface_ref"].as_str().unwrap_or("?"),
                s["title"].as_str().unwrap_or(""),
                s["kind"].as_str().unwrap_or("?"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Parser)]
pub struct ListSurfaces {
    /// Workspace to list (default: current)
    #[arg(long = "workspace")]
    workspace: Option<String>,
}

impl ListSurfaces {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(workspace) = &self.workspace {
            params["workspace_id"] = json!(workspace);
        }
        let result = ctx.client.call_ok("surface.list", params)?;
        let surfaces = result.as_array().cloned().unwrap_or_default();
        let pretty = render_surfaces(&surfaces);
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct ListPaneSurfaces {
    /// Pane to list (default: focused pane)
    #[arg(long = "pane")]
    pane: Option<String>,
}

impl ListPaneSurfaces {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        // no v2 spelling for per-pane listings; this is a v1 verb
        let command = match &self.pane {
            Some(pane) => format!("list_pane_surfaces --pane={}", pane),
            None => "list_pane_surfaces".to_string(),
        };
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}
