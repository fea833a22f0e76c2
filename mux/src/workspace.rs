use crate::handle::{format_ref, RefKind};
use crate::pane::PaneId;
use crate::split::SplitTree;
use crate::window::WindowId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type WorkspaceId = Uuid;

/// A keyed status indicator shown on the workspace tab, used by agent
/// integrations (`set_status` / `clear_status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusIndicator {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One sidebar "tab": a split tree of panes inside a window.
pub struct Workspace {
    id: WorkspaceId,
    ref_no: u64,
    window_id: WindowId,
    title: String,
    tree: SplitTree,
    focused_pane: PaneId,
    status: BTreeMap<String, StatusIndicator>,
}

impl Workspace {
    pub fn new(ref_no: u64, window_id: WindowId, title: String, root_pane: PaneId) -> Self {
        Self {
            id: Uuid::new_v4(),
            ref_no,
            window_id,
            title,
            tree: SplitTree::new(root_pane),
            focused_pane: root_pane,
            status: BTreeMap::new(),
        }
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.id
    }

    pub fn ref_string(&self) -> String {
        format_ref(RefKind::Workspace, self.ref_no)
    }

    pub fn window_id(&self) -> WindowId {
        self.window_id
    }

    pub fn set_window_id(&mut self, window_id: WindowId) {
        self.window_id = window_id;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn tree(&self) -> &SplitTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SplitTree {
        &mut self.tree
    }

    pub fn focused_pane(&self) -> PaneId {
        self.focused_pane
    }

    /// The focused pane must always reference a pane in the tree; callers
    /// verify membership before calling.
    pub fn set_focused_pane(&mut self, pane: PaneId) {
        self.focused_pane = pane;
    }

    pub fn set_status(&mut self, key: &str, indicator: StatusIndicator) {
        self.status.insert(key.to_string(), indicator);
    }

    pub fn clear_status(&mut self, key: &str) -> bool {
        self.status.remove(key).is_some()
    }

    pub fn status(&self) -> &BTreeMap<String, StatusIndicator> {
        &self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceEntry {
    pub workspace_id: WorkspaceId,
    pub workspace_ref: String,
    pub window_id: WindowId,
    pub title: String,
    pub pane_count: usize,
    pub is_selected: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub status: BTreeMap<String, StatusIndicator>,
}

impl WorkspaceEntry {
    pub fn from_workspace(ws: &Workspace, is_selected: bool) -> Self {
        Self {
            workspace_id: ws.workspace_id(),
            workspace_ref: ws.ref_string(),
            window_id: ws.window_id(),
            title: ws.title().to_string(),
            pane_count: ws.tree().len(),
            is_selected,
            status: ws.status().clone(),
        }
    }
}
