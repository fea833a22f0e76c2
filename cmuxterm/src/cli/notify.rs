use super::Ctx;
use clap::Parser;

#[derive(Debug, Parser)]
pub struct Notify {
    /// Notification title
    title: String,
    /// Optional subtitle
    subtitle: Option<String>,
    /// Optional body
    body: Option<String>,

    /// Target workspace (default: $CMUX_WORKSPACE_ID, else current)
    #[arg(long = "workspace")]
    workspace: Option<String>,

    /// Target surface (default: $CMUX_SURFACE_ID, else none)
    #[arg(long = "surface")]
    surface: Option<String>,
}

impl Notify {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let cfg = config::configuration();
        let payload = codec::encode_notify_payload(
            &self.title,
            self.subtitle.as_deref().unwrap_or(""),
            self.body.as_deref().unwrap_or(""),
        );
        let workspace = self
            .workspace
            .clone()
            .or_else(|| cfg.workspace_ctx.clone());
        let surface = self.surface.clone().or_else(|| cfg.surface_ctx.clone());

        let command = match (&workspace, &surface) {
            (Some(ws), Some(sfc)) => format!("notify_target {} {} {}", ws, sfc, payload),
            (Some(ws), None) => format!("notify_target {} - {}", ws, payload),
            (None, Some(sfc)) => format!("notify_surface {} {}", sfc, payload),
            (None, None) => format!("notify {}", payload),
        };
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}

#[derive(Debug, Parser)]
pub struct ListNotifications {}

impl ListNotifications {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let response = ctx.client.send_line("list_notifications")?;
        ctx.print_raw(&response)
    }
}

#[derive(Debug, Parser)]
pub struct ClearNotifications {}

impl ClearNotifications {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let response = ctx.client.send_line("clear_notifications")?;
        ctx.print_raw(&response)
    }
}
