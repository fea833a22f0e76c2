use super::Ctx;
use anyhow::Context as _;
use clap::Parser;
use serde_json::{json, Value};

#[derive(Debug, Parser)]
pub enum BrowserCommand {
    /// Open a url, reusing the workspace's browser surface when present
    #[command(name = "open")]
    Open {
        url: String,
        /// Workspace to open in (default: $CMUX_WORKSPACE_ID, else current)
        #[arg(long = "workspace")]
        workspace: Option<String>,
    },

    /// Navigate a browser surface to a url
    #[command(name = "navigate")]
    Navigate { surface: String, url: String },

    #[command(name = "back")]
    Back { surface: Option<String> },

    #[command(name = "forward")]
    Forward { surface: Option<String> },

    #[command(name = "reload")]
    Reload { surface: Option<String> },

    /// Print the current url
    #[command(name = "get-url")]
    GetUrl { surface: Option<String> },

    /// Print a text-tree snapshot of the page
    #[command(name = "snapshot")]
    Snapshot {
        surface: Option<String>,
        #[arg(long = "selector")]
        selector: Option<String>,
    },

    /// Capture a screenshot (prints base64 png)
    #[command(name = "screenshot")]
    Screenshot { surface: Option<String> },

    /// Wait for a page condition
    #[command(name = "wait")]
    Wait {
        surface: Option<String>,
        #[arg(long = "selector")]
        selector: Option<String>,
        #[arg(long = "url-contains")]
        url_contains: Option<String>,
        #[arg(long = "load-state")]
        load_state: Option<String>,
        #[arg(long = "timeout-ms", default_value = "10000")]
        timeout_ms: u64,
    },

    /// Call any browser.* method with raw JSON params
    #[command(name = "call")]
    Call {
        /// Method name without the browser. prefix, e.g. get.text
        method: String,
        /// Params as a JSON object
        #[arg(long = "params", default_value = "{}")]
        params: String,
    },
}

fn surface_params(surface: &Option<String>) -> Value {
    match surface {
        Some(surface) => json!({ "surface_id": surface }),
        None => json!({}),
    }
}

pub fn run(cmd: BrowserCommand, ctx: &mut Ctx) -> anyhow::Result<()> {
    match cmd {
        BrowserCommand::Open { url, workspace } => {
            let cfg = config::configuration();
            let mut params = json!({ "url": url });
            if let Some(workspace) = workspace.or_else(|| cfg.workspace_ctx.clone()) {
                params["workspace_id"] = json!(workspace);
            }
            let result = ctx.client.call_ok("browser.open_split", params)?;
            let pretty = format!(
                "OK {} created_split={}",
                result["surface_ref"].as_str().unwrap_or("?"),
                result["created_split"].as_bool().unwrap_or(false),
            );
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Navigate { surface, url } => {
            let result = ctx.client.call_ok(
                "browser.navigate",
                json!({ "surface_id": surface, "url": url }),
            )?;
            let pretty = format!("OK {}", result["url"].as_str().unwrap_or(""));
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Back { surface } => {
            let result = ctx.client.call_ok("browser.back", surface_params(&surface))?;
            let pretty = format!("OK {}", result["url"].as_str().unwrap_or(""));
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Forward { surface } => {
            let result = ctx
                .client
                .call_ok("browser.forward", surface_params(&surface))?;
            let pretty = format!("OK {}", result["url"].as_str().unwrap_or(""));
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Reload { surface } => {
            let result = ctx
                .client
                .call_ok("browser.reload", surface_params(&surface))?;
            ctx.print_value(result, "OK")
        }
        BrowserCommand::GetUrl { surface } => {
            let result = ctx.client.call_ok("browser.url.get", surface_params(&surface))?;
            let pretty = result["value"].as_str().unwrap_or("").to_string();
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Snapshot { surface, selector } => {
            let mut params = surface_params(&surface);
            if let Some(selector) = selector {
                params["selector"] = json!(selector);
            }
            let result = ctx.client.call_ok("browser.snapshot", params)?;
            let pretty = result["snapshot"].as_str().unwrap_or("").to_string();
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Screenshot { surface } => {
            let result = ctx
                .client
                .call_ok("browser.screenshot", surface_params(&surface))?;
            let pretty = result["png_base64"].as_str().unwrap_or("").to_string();
            ctx.print_value(result, &pretty)
        }
        BrowserCommand::Wait {
            surface,
            selector,
            url_contains,
            load_state,
            timeout_ms,
        } => {
            let mut params = surface_params(&surface);
            if let Some(selector) = selector {
                params["selector"] = json!(selector);
            }
            if let Some(url_contains) = url_contains {
                params["url_contains"] = json!(url_contains);
            }
            if let Some(load_state) = load_state {
                params["load_state"] = json!(load_state);
            }
            params["timeout_ms"] = json!(timeout_ms);
            let result = ctx.client.call_ok("browser.wait", params)?;
            ctx.print_value(result, "OK")
        }
        BrowserCommand::Call { method, params } => {
            let params: Value = serde_json::from_str(&params)
                .with_context(|| format!("--params is not valid JSON: {:?}", params))?;
            let result = ctx
                .client
                .call_ok(&format!("browser.{}", method), params)?;
            // print the natural text field when the method has one
            let pretty = result
                .get("value")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| result.to_string());
            ctx.print_value(result, &pretty)
        }
    }
}
