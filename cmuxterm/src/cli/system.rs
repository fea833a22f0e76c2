use super::Ctx;
use clap::Parser;
use serde_json::{json, Value};

#[derive(Debug, Parser)]
pub struct Identify {
    /// Optional caller label echoed back in the result
    #[arg(long = "caller")]
    caller: Option<String>,
}

impl Identify {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut params = json!({});
        if let Some(caller) = &self.caller {
            params["caller"] = json!(caller);
        }
        let result = ctx.client.call_ok("system.identify", params)?;
        let pretty = render(&result);
        ctx.print_value(result, &pretty)
    }
}

fn render(result: &Value) -> String {
    let field = |id: &str, reference: &str| -> String {
        match (result.get(id).and_then(Value::as_str), result.get(reference).and_then(Value::as_str)) {
            (Some(id), Some(reference)) => format!("{} ({})", reference, id),
            (None, Some(reference)) => reference.to_string(),
            (Some(id), None) => id.to_string(),
            (None, None) => "-".to_string(),
        }
    };
    format!(
        "window    {}\nworkspace {}\npane      {}\nsurface   {}",
        field("window_id", "window_ref"),
        field("workspace_id", "workspace_ref"),
        field("pane_id", "pane_ref"),
        field("surface_id", "surface_ref"),
    )
}

#[derive(Debug, Parser)]
pub struct Capabilities {}

impl Capabilities {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let result = ctx.client.call_ok("system.capabilities", json!({}))?;
        let pretty = match result.get("methods").and_then(Value::as_array) {
            Some(methods) => methods
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        };
        ctx.print_value(result, &pretty)
    }
}
