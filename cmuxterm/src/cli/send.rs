use super::Ctx;
use clap::Parser;

#[derive(Debug, Parser)]
pub struct Send {
    /// Text to send; \n \r \t \\ escapes are honored
    text: Vec<String>,

    /// Target surface (default: focused surface)
    #[arg(long = "surface")]
    surface: Option<String>,

    /// Append a newline (send Enter) after the text
    #[arg(long = "enter")]
    enter: bool,
}

impl Send {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let mut text = codec::escape_text(&self.text.join(" "));
        if self.enter {
            text.push_str("\\n");
        }
        let command = match &self.surface {
            Some(surface) => format!("send_surface {} {}", surface, text),
            None => format!("send {}", text),
        };
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}

#[derive(Debug, Parser)]
pub struct SendKey {
    /// Key chord, e.g. Enter, Escape, ctrl-c
    key: String,

    /// Target surface (default: focused surface)
    #[arg(long = "surface")]
    surface: Option<String>,
}

impl SendKey {
    pub fn run(&self, ctx: &mut Ctx) -> anyhow::Result<()> {
        let command = match &self.surface {
            Some(surface) => format!("send_key_surface {} {}", surface, self.key),
            None => format!("send_key {}", self.key),
        };
        let response = ctx.client.send_line(&command)?;
        ctx.print_raw(&response)
    }
}
