use crate::handle::{format_ref, RefKind};
use crate::pane::PaneId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SurfaceId = Uuid;
pub type PanelId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Terminal,
    Browser,
}

impl std::str::FromStr for PanelKind {
    type Err = crate::error::MuxError;
    fn from_str(s: &str) -> Result<PanelKind, Self::Err> {
        match s {
            "terminal" | "t" => Ok(PanelKind::Terminal),
            "browser" | "b" => Ok(PanelKind::Browser),
            _ => Err(crate::error::MuxError::InvalidArgument(format!(
                "invalid surface type {:?}",
                s
            ))),
        }
    }
}

/// The rendering object behind a surface.  The host collaborator owns the
/// real thing; the core stores only the identifier and kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub panel_id: PanelId,
    pub kind: PanelKind,
}

impl Panel {
    pub fn new(kind: PanelKind) -> Self {
        Self {
            panel_id: Uuid::new_v4(),
            kind,
        }
    }
}

/// One tab within a pane; owns exactly one panel.
pub struct Surface {
    id: SurfaceId,
    ref_no: u64,
    pane_id: PaneId,
    panel: Panel,
    title: String,
}

impl Surface {
    pub fn new(ref_no: u64, pane_id: PaneId, kind: PanelKind, title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            ref_no,
            pane_id,
            panel: Panel::new(kind),
            title,
        }
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.id
    }

    pub fn ref_string(&self) -> String {
        format_ref(RefKind::Surface, self.ref_no)
    }

    pub fn pane_id(&self) -> PaneId {
        self.pane_id
    }

    pub fn set_pane_id(&mut self, pane_id: PaneId) {
        self.pane_id = pane_id;
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn kind(&self) -> PanelKind {
        self.panel.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SurfaceEntry {
    pub surface_id: SurfaceId,
    pub surface_ref: String,
    pub pane_id: PaneId,
    pub panel_id: PanelId,
    pub kind: PanelKind,
    pub title: String,
    pub is_selected: bool,
    pub is_focused: bool,
}

impl SurfaceEntry {
    pub fn from_surface(surface: &Surface, is_selected: bool, is_focused: bool) -> Self {
        Self {
            surface_id: surface.surface_id(),
            surface_ref: surface.ref_string(),
            pane_id: surface.pane_id(),
            panel_id: surface.panel().panel_id,
            kind: surface.kind(),
            title: surface.title().to_string(),
            is_selected,
            is_focused,
        }
    }
}
