use crate::handle::{format_ref, RefKind};
use crate::workspace::WorkspaceId;
use serde::Serialize;
use uuid::Uuid;

pub type WindowId = Uuid;

/// A top-level application container holding an ordered list of workspaces.
/// Exactly one window is "key" at a time; that flag lives on the Mux.
pub struct Window {
    id: WindowId,
    ref_no: u64,
    workspaces: Vec<WorkspaceId>,
    selected_workspace: Option<WorkspaceId>,
}

impl Window {
    pub fn new(ref_no: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            ref_no,
            workspaces: vec![],
            selected_workspace: None,
        }
    }

    pub fn window_id(&self) -> WindowId {
        self.id
    }

    pub fn ref_string(&self) -> String {
        format_ref(RefKind::Window, self.ref_no)
    }

    pub fn workspaces(&self) -> &[WorkspaceId] {
        &self.workspaces
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn idx_of(&self, id: WorkspaceId) -> Option<usize> {
        self.workspaces.iter().position(|&w| w == id)
    }

    pub fn insert(&mut self, index: usize, id: WorkspaceId) {
        let index = index.min(self.workspaces.len());
        self.workspaces.insert(index, id);
        if self.selected_workspace.is_none() {
            self.selected_workspace = Some(id);
        }
    }

    pub fn push(&mut self, id: WorkspaceId) {
        let at = self.workspaces.len();
        self.insert(at, id);
    }

    /// Remove a workspace, reassigning selection to the next sibling by
    /// index, else the previous.  Returns true if it was present.
    pub fn remove(&mut self, id: WorkspaceId) -> bool {
        let idx = match self.idx_of(id) {
            Some(idx) => idx,
            None => return false,
        };
        self.workspaces.remove(idx);
        if self.selected_workspace == Some(id) {
            self.selected_workspace = self
                .workspaces
                .get(idx)
                .or_else(|| self.workspaces.get(idx.wrapping_sub(1)))
                .copied();
        }
        true
    }

    pub fn selected_workspace(&self) -> Option<WorkspaceId> {
        self.selected_workspace
    }

    pub fn select(&mut self, id: WorkspaceId) -> bool {
        if self.workspaces.contains(&id) {
            self.selected_workspace = Some(id);
            true
        } else {
            false
        }
    }

    /// Move a workspace to a new index within this window.
    pub fn reorder(&mut self, id: WorkspaceId, index: usize) -> bool {
        let from = match self.idx_of(id) {
            Some(idx) => idx,
            None => return false,
        };
        self.workspaces.remove(from);
        let index = index.min(self.workspaces.len());
        self.workspaces.insert(index, id);
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowEntry {
    pub window_id: WindowId,
    pub window_ref: String,
    pub is_key: bool,
    pub workspace_count: usize,
    pub selected_workspace_id: Option<WorkspaceId>,
}

impl WindowEntry {
    pub fn from_window(window: &Window, is_key: bool) -> Self {
        Self {
            window_id: window.window_id(),
            window_ref: window.ref_string(),
            is_key,
            workspace_count: window.len(),
            selected_workspace_id: window.selected_workspace(),
        }
    }
}
