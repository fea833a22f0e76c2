use super::Ctx;
use clap::Parser;
use serde_json::json;

#[derive(Debug, Parser)]
pub struct FocusPane {
    /// Pane handle (uuid, pane:N or index)
    pane: String,
}

impl FocusPane {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx
            .client
            .call_ok("pane.focus", json!({ "pane_id": self.pane }))?;
        ctx.print_value(result, "OK")
    }
}

#[derive(Debug, Parser)]
pub struct NewSurface {
    /// Surface kind: terminal or browser
    #[arg(long = "type", default_value = "terminal")]
    kind: String,

    /// Pane to create the surface in (default: focused pane)
    #[arg(long = "pane")]
    pane: Option<String>,

    /// Initial url for browser surfaces
    #[arg(long = "url")]
    url: Option<String>,
}

impl NewSurface {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({ "kind": self.kind });
        if let Some(pane) = &self.pane {
            params["pane_id"] = json!(pane);
        }
        if let Some(url) = &self.url {
            params["url"] = json!(url);
        }
        let result = ctx.client.call_ok("surface.new", params)?;
        let pretty = format!("OK {}", result["surface_id"].as_str().unwrap_or("?"));
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct CloseSurface {
    /// Surface handle (default: focused surface)
    #[arg(long = "surface")]
    surface: Option<String>,
}

impl CloseSurface {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(surface) = &self.surface {
            params["surface_id"] = json!(surface);
        }
        let result = ctx.client.call_ok("surface.close", params)?;
        ctx.print_value(result, "OK")
    }
}

#[derive(Debug, Parser)]
pub struct FocusSurface {
    /// Surface handle (uuid, surface:N or index)
    surface: String,
}

impl FocusSurface {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx
            .client
            .call_ok("surface.focus", json!({ "surface_id": self.surface }))?;
        ctx.print_value(result, "OK")
    }
}

#[derive(Debug, Parser)]
pub struct ReorderSurface {
    /// Surface handle (default: focused surface)
    #[arg(long = "surface")]
    surface: Option<String>,

    /// New 0-based index on the pane's surface listing
    #[arg(long = "index")]
    index: Option<usize>,

    /// Place before this surface
    #[arg(long = "before")]
    before: Option<String>,

    /// Place after this surface
    #[arg(long = "after")]
    after: Option<String>,
}

impl ReorderSurface {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(surface) = &self.surface {
            params["surface_id"] = json!(surface);
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
        let result = ctx.client.call_ok("surface.reorder", params)?;
        let pretty = format!("OK index {}", result["index"].as_u64().unwrap_or(0));
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct MoveSurface {
    /// Surface to move (default: focused surface)
    #[arg(long = "surface")]
    surface: Option<String>,

    /// Destination pane
    #[arg(long = "pane")]
    pane: Option<String>,

    /// Destination workspace (its focused pane)
    #[arg(long = "workspace")]
    workspace: Option<String>,

    /// Destination window (required when crossing windows)
    #[arg(long = "to-window")]
    window: Option<String>,

    /// Insert position within the destination pane
    #[arg(long = "index")]
    index: Option<usize>,

    #[arg(long = "before")]
    before: Option<String>,

    #[arg(long = "after")]
    after: Option<String>,

    /// Focus the surface after the move (default: only when it was
    /// already focused)
    #[arg(long = "focus")]
    focus: bool,
}

impl MoveSurface {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(surface) = &self.surface {
            params["surface_id"] = json!(surface);
        }
        if let Some(pane) = &self.pane {
            params["pane_id"] = json!(pane);
        }
        if let Some(workspace) = &self.workspace {
            params["workspace_id"] = json!(workspace);
        }
        if let Some(window) = &self.window {
            params["window_id"] = json!(window);
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
        if self.focus {
            params["focus"] = json!(true);
        }
        let result = ctx.client.call_ok("surface.move", params)?;
        let pretty = format!(
            "OK {} -> {} index {}",
            result["surface_ref"].as_str().unwrap_or("?"),
            result["pane_ref"].as_str().unwrap_or("?"),
            result["index"].as_u64().unwrap_or(0),
        );
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct NewSplit {
    /// Split direction: left, right, up or down
    direction: String,

    /// Pane to split (default: focused pane)
    #[arg(long = "pane")]
    pane: Option<String>,
}

impl NewSplit {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let command = match &self.pane {
            Some(pane) => format!("new_split {} {}", self.direction, pane),
            None => format!("new_split {}", self.direction),
        };
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}

#[derive(Debug, Parser)]
pub struct DragSurfaceToSplit {
    /// Surface to move
    surface: String,
    /// Edge direction: left, right, up or down
    direction: String,
}

impl DragSurfaceToSplit {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let response = ctx
            .client
            .send_line(&format!("drag_surface_to_split {} {}", self.surface, self.direction))?;
        ctx.print_raw(&response)
    }
}
