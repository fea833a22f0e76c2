use super::Ctx;
use clap::Parser;
use serde_json::json;

#[derive(Debug, Parser)]
pub struct NewWindow {}

impl NewWindow {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx.client.call_ok("window.new", json!({}))?;
        let pretty = format!(
            "OK {}",
            result["window_ref"]
                .as_str()
                .or_else(|| result["window_id"].as_str())
                .unwrap_or("?")
        );
        ctx.print_value(result, &pretty)
    }
}

#[derive(Debug, Parser)]
pub struct FocusWindow {
    /// Window handle (uuid, window:N or index)
    window: String,
}

impl FocusWindow {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx
            .client
            .call_ok("window.focus", json!({ "window_id": self.window }))?;
        ctx.print_value(result, "OK")
    }
}

/// Closes the key window; combine with the global `--window` flag to
/// target another one.
#[derive(Debug, Parser)]
pub struct CloseWindow {
    /// Window handle (default: key window)
    #[arg(long = "target")]
    target: Option<String>,

    /// Fail instead of closing a window that still has workspaces
    #[arg(long = "only-if-empty")]
    only_if_empty: bool,
}

impl CloseWindow {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({ "force": !self.only_if_empty });
        if let Some(target) = &self.target {
            params["window_id"] = json!(target);
        }
        let result = ctx.client.call_ok("window.close", params)?;
        ctx.print_value(result, "OK")
    }
}
