//! The seam between the core and the rendering host.
//!
//! The host (GUI shell) owns the real terminal emulator and web view
//! objects; the core only holds panel identifiers and calls through this
//! trait.  A small capability set is required of every panel kind;
//! kind-specific operations live on the browser adapter.

use crate::surface::{Panel, PanelKind};

pub trait PanelHost: Send + Sync {
    fn close(&self, _panel: &Panel) {}

    fn refresh(&self, _panel: &Panel) {}

    fn set_title(&self, _panel: &Panel, _title: &str) {}

    /// Emit a host-visible attention signal for the panel.
    fn flash(&self, _panel: &Panel) {}

    fn is_healthy(&self, _panel: &Panel) -> bool {
        true
    }

    fn send_text(&self, panel: &Panel, _text: &str) -> anyhow::Result<()> {
        match panel.kind {
            PanelKind::Terminal => Ok(()),
            PanelKind::Browser => anyhow::bail!("cannot send text to a browser panel"),
        }
    }

    fn send_key(&self, panel: &Panel, _key: &str) -> anyhow::Result<()> {
        match panel.kind {
            PanelKind::Terminal => Ok(()),
            PanelKind::Browser => anyhow::bail!("cannot send keys to a browser panel"),
        }
    }
}

/// Headless host used by tests and by the server before the GUI attaches.
pub struct NullPanelHost;

impl PanelHost for NullPanelHost {}
