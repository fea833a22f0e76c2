use super::Ctx;
use clap::Parser;

#[derive(Debug, Parser)]
pub struct SetStatus {
    /// Status key, e.g. "claude"
    key: String,
    /// Status value, e.g. "Running"
    value: String,

    /// SF Symbols icon name
    #[arg(long = "icon")]
    icon: Option<String>,

    /// Hex color, e.g. #ff8800
    #[arg(long = "color")]
    color: Option<String>,

    /// Workspace tab to badge (default: current)
    #[arg(long = "tab")]
    tab: Option<String>,
}

impl SetStatus {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut command = format!("set_status {} {}", self.key, self.value);
        if let Some(icon) = &self.icon {
            command.push_str(&format!(" --icon={}", icon));
        }
        if let Some(color) = &self.color {
            command.push_str(&format!(" --color={}", color));
        }
        if let Some(tab) = &self.tab {
            command.push_str(&format!(" --tab={}", tab));
        }
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}

#[derive(Debug, Parser)]
pub struct ClearStatus {
    /// Status key to clear
    key: String,

    /// Workspace tab (default: current)
    #[arg(long = "tab")]
    tab: Option<String>,
}

impl ClearStatus {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut command = format!("clear_status {}", self.key);
        if let Some(tab) = &self.tab {
            command.push_str(&format!(" --tab={}", tab));
        }
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}

#[derive(Debug, Parser)]
pub struct SetAppFocus {
    /// One of: active, inactive, clear
    state: String,
}

impl SetAppFocus {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let response = ctx
            .client
            .send_line(&format!("set_app_focus {}", self.state))?;
        ctx.print_raw(&response)
    }
}
