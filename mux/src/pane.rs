use crate::handle::{format_ref, RefKind};
use crate::surface::SurfaceId;
use crate::workspace::WorkspaceId;
use serde::Serialize;
use uuid::Uuid;

pub type PaneId = Uuid;

/// A leaf region of the workspace split tree; holds an ordered list of
/// surfaces (the tabs within the pane).
pub struct Pane {
    id: PaneId,
    ref_no: u64,
    workspace_id: WorkspaceId,
    surfaces: Vec<SurfaceId>,
    selected_surface: Option<SurfaceId>,
}

impl Pane {
    pub fn new(ref_no: u64, workspace_id: WorkspaceId) -> Self {
        Self {
            id: Uuid::new_v4(),
            ref_no,
            workspace_id,
            surfaces: vec![],
            selected_surface: None,
        }
    }

    pub fn pane_id(&self) -> PaneId {
        self.id
    }

    pub fn ref_string(&self) -> String {
        format_ref(RefKind::Pane, self.ref_no)
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    pub fn set_workspace_id(&mut self, workspace_id: WorkspaceId) {
        self.workspace_id = workspace_id;
    }

    pub fn surfaces(&self) -> &[SurfaceId] {
        &self.surfaces
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn idx_of(&self, id: SurfaceId) -> Option<usize> {
        self.surfaces.iter().position(|&s| s == id)
    }

    pub fn insert(&mut self, index: usize, id: SurfaceId) {
        let index = index.min(self.surfaces.len());
        self.surfaces.insert(index, id);
        if self.selected_surface.is_none() {
            self.selected_surface = Some(id);
        }
    }

    pub fn push(&mut self, id: SurfaceId) {
        let at = self.surfaces.len();
        self.insert(at, id);
    }

    /// Remove a surface, reassigning selection to the next sibling by
    /// index, else the previous.  Returns true if it was present.
    pub fn remove(&mut self, id: SurfaceId) -> bool {
        let idx = match self.idx_of(id) {
            Some(idx) => idx,
            None => return false,
        };
        self.surfaces.remove(idx);
        if self.selected_surface == Some(id) {
            self.selected_surface = self
                .surfaces
                .get(idx)
                .or_else(|| self.surfaces.get(idx.wrapping_sub(1)))
                .copied();
        }
        true
    }

    pub fn selected_surface(&self) -> Option<SurfaceId> {
        self.selected_surface
    }

    pub fn select(&mut self, id: SurfaceId) -> bool {
        if self.surfaces.contains(&id) {
            self.selected_surface = Some(id);
            true
        } else {
            false
        }
    }

    /// Move a surface to a new index within this pane.
    pub fn reorder(&mut self, id: SurfaceId, index: usize) -> bool {
        let from = match self.idx_of(id) {
            Some(idx) => idx,
            None => return false,
        };
        self.surfaces.remove(from);
        let index = index.min(self.surfaces.len());
        self.surfaces.insert(index, id);
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaneEntry {
    pub pane_id: PaneId,
    pub pane_ref: String,
    pub workspace_id: WorkspaceId,
    pub surface_count: usize,
    pub is_focused: bool,
    pub selected_surface_id: Option<SurfaceId>,
}

impl PaneEntry {
    pub fn from_pane(pane: &Pane, is_focused: bool) -> Self {
        Self {
            pane_id: pane.pane_id(),
            pane_ref: pane.ref_string(),
            workspace_id: pane.workspace_id(),
            surface_count: pane.len(),
            is_focused,
            selected_surface_id: pane.selected_surface(),
        }
    }
}
