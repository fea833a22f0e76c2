//! The cmuxterm control-plane core: an in-memory topology of
//! Windows → Workspaces → Panes → Surfaces → Panels, plus the
//! notification log and the focus model.
//!
//! The topology is an arena keyed by UUID; child order lives in `Vec`s on
//! the parent and parent links are plain UUID back-references.  The split
//! tree is a separate owning tree whose leaves reference panes by id.
//! All mutation is expected to be serialized onto one scheduling thread
//! by the embedding server; reads may come from anywhere.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub mod error;
pub mod handle;
pub mod host;
pub mod notification;
pub mod pane;
pub mod split;
pub mod surface;
pub mod window;
pub mod workspace;

pub use error::{MuxError, Result};
pub use handle::{format_ref, Handle, RefKind};
pub use host::{NullPanelHost, PanelHost};
pub use notification::{Notification, NotificationId, NotificationStore};
pub use pane::{Pane, PaneEntry, PaneId};
pub use split::{SplitDirection, SplitNode, SplitOrientation, SplitTree};
pub use surface::{Panel, PanelId, PanelKind, Surface, SurfaceEntry, SurfaceId};
pub use window::{Window, WindowEntry, WindowId};
pub use workspace::{StatusIndicator, Workspace, WorkspaceEntry, WorkspaceId};

#[derive(Clone, Debug)]
pub enum MuxNotification {
    WindowCreated(WindowId),
    WindowRemoved(WindowId),
    WindowFocused(WindowId),
    WorkspaceCreated {
        window_id: WindowId,
        workspace_id: WorkspaceId,
    },
    WorkspaceRemoved(WorkspaceId),
    WorkspaceSelected {
        window_id: WindowId,
        workspace_id: WorkspaceId,
    },
    WorkspaceMoved {
        workspace_id: WorkspaceId,
        window_id: WindowId,
    },
    WorkspaceStatusChanged(WorkspaceId),
    PaneAdded(PaneId),
    PaneRemoved(PaneId),
    PaneFocused(PaneId),
    SurfaceAdded(SurfaceId),
    SurfaceRemoved(SurfaceId),
    SurfaceFocused(SurfaceId),
    SurfaceMoved(SurfaceId),
    SurfaceFlash {
        workspace_id: WorkspaceId,
        surface_id: SurfaceId,
    },
    NotificationAdded(NotificationId),
    NotificationsCleared,
    AppActiveChanged(bool),
    Empty,
}

static SUB_ID: AtomicUsize = AtomicUsize::new(0);

/// Per-kind monotonic ref registry.  Refs are assigned when an entity is
/// created and never reused within the process lifetime.
#[derive(Default)]
struct Refs {
    window: AtomicU64,
    workspace: AtomicU64,
    pane: AtomicU64,
    surface: AtomicU64,
    by_ref: RwLock<HashMap<(RefKind, u64), Uuid>>,
}

impl Refs {
    fn lookup(&self, kind: RefKind, n: u64) -> Option<Uuid> {
        self.by_ref.read().get(&(kind, n)).copied()
    }

    fn forget(&self, id: Uuid) {
        self.by_ref.write().retain(|_, v| *v != id);
    }
}

/// The focused (window, workspace, pane, surface) tuple.  At most one
/// surface is focused across the whole topology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Focus {
    pub window_id: WindowId,
    pub workspace_id: WorkspaceId,
    pub pane_id: PaneId,
    pub surface_id: Option<SurfaceId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResult {
    pub window_id: WindowId,
    pub window_ref: String,
    pub workspace_id: WorkspaceId,
    pub workspace_ref: String,
    pub pane_id: PaneId,
    pub pane_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_id: Option<SurfaceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

/// Position selector for reorder/move operations.  At most one of the
/// fields is honored, in the order index, after, before.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub before: Option<Handle>,
    pub after: Option<Handle>,
    pub index: Option<usize>,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none() && self.index.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MoveRequest {
    pub pane: Option<Handle>,
    pub workspace: Option<Handle>,
    pub window: Option<Handle>,
    pub position: Position,
    pub focus: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveResult {
    pub surface_id: SurfaceId,
    pub surface_ref: String,
    pub pane_id: PaneId,
    pub pane_ref: String,
    pub workspace_id: WorkspaceId,
    pub workspace_ref: String,
    pub window_id: WindowId,
    pub window_ref: String,
    pub index: usize,
}

pub struct Mux {
    windows: RwLock<HashMap<WindowId, Window>>,
    window_order: RwLock<Vec<WindowId>>,
    workspaces: RwLock<HashMap<WorkspaceId, Workspace>>,
    panes: RwLock<HashMap<PaneId, Pane>>,
    surfaces: RwLock<HashMap<SurfaceId, Surface>>,
    key_window: RwLock<Option<WindowId>>,
    notifications: Mutex<NotificationStore>,
    refs: Refs,
    subscribers: RwLock<HashMap<usize, Box<dyn Fn(MuxNotification) -> bool + Send + Sync>>>,
    host: RwLock<Arc<dyn PanelHost>>,
    host_active: AtomicBool,
    focus_override: Mutex<Option<bool>>,
}

lazy_static::lazy_static! {
    static ref MUX: Mutex<Option<Arc<Mux>>> = Mutex::new(None);
}

impl Mux {
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            window_order: RwLock::new(vec![]),
            workspaces: RwLock::new(HashMap::new()),
            panes: RwLock::new(HashMap::new()),
            surfaces: RwLock::new(HashMap::new()),
            key_window: RwLock::new(None),
            notifications: Mutex::new(NotificationStore::default()),
            refs: Refs::default(),
            subscribers: RwLock::new(HashMap::new()),
            host: RwLock::new(Arc::new(NullPanelHost)),
            host_active: AtomicBool::new(false),
            focus_override: Mutex::new(None),
        }
    }

    pub fn set_mux(mux: &Arc<Mux>) {
        MUX.lock().replace(Arc::clone(mux));
    }

    pub fn shutdown() {
        MUX.lock().take();
    }

    pub fn get() -> Arc<Mux> {
        Mux::try_get().expect("Mux::set_mux has not been called yet")
    }

    pub fn try_get() -> Option<Arc<Mux>> {
        MUX.lock().as_ref().map(Arc::clone)
    }

    pub fn set_panel_host(&self, host: Arc<dyn PanelHost>) {
        *self.host.write() = host;
    }

    fn host(&self) -> Arc<dyn PanelHost> {
        Arc::clone(&self.host.read())
    }

    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(MuxNotification) -> bool + 'static + Send + Sync,
    {
        let sub_id = SUB_ID.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(sub_id, Box::new(subscriber));
    }

    pub fn notify(&self, notification: MuxNotification) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|_, sub| sub(notification.clone()));
    }

    // ----- focus model -----

    pub fn is_app_active(&self) -> bool {
        (*self.focus_override.lock()).unwrap_or_else(|| self.host_active.load(Ordering::Relaxed))
    }

    /// The host's real activation state; `None` clears any override.
    pub fn set_app_focus(&self, active: Option<bool>) {
        let was_active = self.is_app_active();
        *self.focus_override.lock() = active;
        let now_active = self.is_app_active();
        if was_active != now_active {
            self.notify(MuxNotification::AppActiveChanged(now_active));
        }
        if !was_active && now_active {
            self.mark_read_for_current_focus();
        }
    }

    pub fn set_host_active(&self, active: bool) {
        let was_active = self.is_app_active();
        self.host_active.store(active, Ordering::Relaxed);
        let now_active = self.is_app_active();
        if was_active != now_active {
            self.notify(MuxNotification::AppActiveChanged(now_active));
        }
        if !was_active && now_active {
            self.mark_read_for_current_focus();
        }
    }

    /// Run one mark-read pass as if the app had just become active.
    pub fn simulate_app_active(&self) {
        self.mark_read_for_current_focus();
    }

    pub fn focused(&self) -> Option<Focus> {
        let window_id = (*self.key_window.read())?;
        let windows = self.windows.read();
        let workspace_id = windows.get(&window_id)?.selected_workspace()?;
        let workspaces = self.workspaces.read();
        let pane_id = workspaces.get(&workspace_id)?.focused_pane();
        let panes = self.panes.read();
        let surface_id = panes.get(&pane_id)?.selected_surface();
        Some(Focus {
            window_id,
            workspace_id,
            pane_id,
            surface_id,
        })
    }

    fn mark_read_for_current_focus(&self) {
        if let Some(focus) = self.focused() {
            let marked = self
                .notifications
                .lock()
                .mark_read_for_focus(focus.workspace_id, focus.surface_id);
            if marked > 0 {
                log::debug!("marked {} notifications read on focus", marked);
            }
        }
    }

    /// Called after any mutation that may have changed the focused tuple.
    fn focus_changed(&self) {
        if self.is_app_active() {
            self.mark_read_for_current_focus();
        }
    }

    // ----- handle resolution -----

    pub fn resolve_window(&self, handle: &Handle) -> Result<WindowId> {
        match handle {
            Handle::Uuid(id) => {
                if self.windows.read().contains_key(id) {
                    Ok(*id)
                } else {
                    Err(MuxError::not_found(format!("window {}", id)))
                }
            }
            Handle::Ref(RefKind::Window, n) => self
                .refs
                .lookup(RefKind::Window, *n)
                .filter(|id| self.windows.read().contains_key(id))
                .ok_or_else(|| MuxError::not_found(format!("window:{}", n))),
            Handle::Ref(kind, n) => Err(MuxError::InvalidHandle(format!(
                "expected a window handle, got {}:{}",
                kind.as_str(),
                n
            ))),
            Handle::Index(idx) => self
                .window_order
                .read()
                .get(*idx)
                .copied()
                .ok_or_else(|| MuxError::not_found(format!("window index {}", idx))),
            Handle::Current => (*self.key_window.read())
                .ok_or_else(|| MuxError::not_found("no key window")),
        }
    }

    pub fn resolve_workspace(&self, handle: &Handle) -> Result<WorkspaceId> {
        match handle {
            Handle::Uuid(id) => {
                if self.workspaces.read().contains_key(id) {
                    Ok(*id)
                } else {
                    Err(MuxError::not_found(format!("workspace {}", id)))
                }
            }
            Handle::Ref(RefKind::Workspace, n) => self
                .refs
                .lookup(RefKind::Workspace, *n)
                .filter(|id| self.workspaces.read().contains_key(id))
                .ok_or_else(|| MuxError::not_found(format!("workspace:{}", n))),
            Handle::Ref(kind, n) => Err(MuxError::InvalidHandle(format!(
                "expected a workspace handle, got {}:{}",
                kind.as_str(),
                n
            ))),
            Handle::Index(idx) => {
                let window_id = self.resolve_window(&Handle::Current)?;
                let windows = self.windows.read();
                let window = windows
                    .get(&window_id)
                    .ok_or_else(|| MuxError::not_found("key window"))?;
                window
                    .workspaces()
                    .get(*idx)
                    .copied()
                    .ok_or_else(|| MuxError::not_found(format!("workspace index {}", idx)))
            }
            Handle::Current => {
                let window_id = self.resolve_window(&Handle::Current)?;
                self.windows
                    .read()
                    .get(&window_id)
                    .and_then(|w| w.selected_workspace())
                    .ok_or_else(|| MuxError::not_found("no selected workspace"))
            }
        }
    }

    pub fn resolve_pane(&self, handle: &Handle) -> Result<PaneId> {
        match handle {
            Handle::Uuid(id) => {
                if self.panes.read().contains_key(id) {
                    Ok(*id)
                } else {
                    Err(MuxError::not_found(format!("pane {}", id)))
                }
            }
            Handle::Ref(RefKind::Pane, n) => self
                .refs
                .lookup(RefKind::Pane, *n)
                .filter(|id| self.panes.read().contains_key(id))
                .ok_or_else(|| MuxError::not_found(format!("pane:{}", n))),
            Handle::Ref(kind, n) => Err(MuxError::InvalidHandle(format!(
                "expected a pane handle, got {}:{}",
                kind.as_str(),
                n
            ))),
            Handle::Index(idx) => {
                let workspace_id = self.resolve_workspace(&Handle::Current)?;
                let workspaces = self.workspaces.read();
                let ws = workspaces
                    .get(&workspace_id)
                    .ok_or_else(|| MuxError::not_found("current workspace"))?;
                ws.tree()
                    .all_panes()
                    .get(*idx)
                    .copied()
                    .ok_or_else(|| MuxError::not_found(format!("pane index {}", idx)))
            }
            Handle::Current => {
                let workspace_id = self.resolve_workspace(&Handle::Current)?;
                self.workspaces
                    .read()
                    .get(&workspace_id)
                    .map(|ws| ws.focused_pane())
                    .ok_or_else(|| MuxError::not_found("current workspace"))
            }
        }
    }

    pub fn resolve_surface(&self, handle: &Handle) -> Result<SurfaceId> {
        match handle {
            Handle::Uuid(id) => {
                if self.surfaces.read().contains_key(id) {
                    Ok(*id)
                } else {
                    Err(MuxError::not_found(format!("surface {}", id)))
                }
            }
            Handle::Ref(RefKind::Surface, n) => self
                .refs
                .lookup(RefKind::Surface, *n)
                .filter(|id| self.surfaces.read().contains_key(id))
                .ok_or_else(|| MuxError::not_found(format!("surface:{}", n))),
            Handle::Ref(kind, n) => Err(MuxError::InvalidHandle(format!(
                "expected a surface handle, got {}:{}",
                kind.as_str(),
                n
            ))),
            Handle::Index(idx) => {
                let pane_id = self.resolve_pane(&Handle::Current)?;
                let panes = self.panes.read();
                let pane = panes
                    .get(&pane_id)
                    .ok_or_else(|| MuxError::not_found("focused pane"))?;
                pane.surfaces()
                    .get(*idx)
                    .copied()
                    .ok_or_else(|| MuxError::not_found(format!("surface index {}", idx)))
            }
            Handle::Current => {
                let pane_id = self.resolve_pane(&Handle::Current)?;
                self.panes
                    .read()
                    .get(&pane_id)
                    .and_then(|p| p.selected_surface())
                    .ok_or_else(|| MuxError::not_found("no selected surface"))
            }
        }
    }

    // ----- window operations -----

    /// Create a window with one workspace holding a root pane and a
    /// terminal surface, and make it key.
    pub fn new_window(&self) -> WindowId {
        let ref_no = self.refs.window.fetch_add(1, Ordering::Relaxed) + 1;
        let mut window = Window::new(ref_no);
        let window_id = window.window_id();
        self.refs.by_ref.write().insert((RefKind::Window, ref_no), window_id);

        let workspace_id = self.build_workspace(window_id, None);
        window.push(workspace_id);

        self.windows.write().insert(window_id, window);
        self.window_order.write().push(window_id);
        self.key_window.write().replace(window_id);

        self.notify(MuxNotification::WindowCreated(window_id));
        self.notify(MuxNotification::WindowFocused(window_id));
        self.focus_changed();
        window_id
    }

    pub fn list_windows(&self) -> Vec<WindowEntry> {
        let key = *self.key_window.read();
        let windows = self.windows.read();
        self.window_order
            .read()
            .iter()
            .filter_map(|id| windows.get(id))
            .map(|w| WindowEntry::from_window(w, Some(w.window_id()) == key))
            .collect()
    }

    pub fn current_window(&self) -> Result<WindowEntry> {
        let window_id = self.resolve_window(&Handle::Current)?;
        let windows = self.windows.read();
        let window = windows
            .get(&window_id)
            .ok_or_else(|| MuxError::not_found("key window"))?;
        Ok(WindowEntry::from_window(window, true))
    }

    pub fn focus_window(&self, handle: &Handle) -> Result<WindowId> {
        let window_id = self.resolve_window(handle)?;
        self.key_window.write().replace(window_id);
        self.notify(MuxNotification::WindowFocused(window_id));
        self.focus_changed();
        Ok(window_id)
    }

    pub fn close_window(&self, handle: &Handle, force: bool) -> Result<WindowId> {
        let window_id = self.resolve_window(handle)?;
        let workspace_ids: Vec<WorkspaceId> = {
            let windows = self.windows.read();
            let window = windows
                .get(&window_id)
                .ok_or_else(|| MuxError::not_found(format!("window {}", window_id)))?;
            if !window.is_empty() && !force {
                return Err(MuxError::HasWorkspaces);
            }
            window.workspaces().to_vec()
        };

        for workspace_id in workspace_ids {
            self.destroy_workspace(workspace_id);
        }

        self.windows.write().remove(&window_id);
        self.window_order.write().retain(|&id| id != window_id);
        self.refs.forget(window_id);

        let mut key = self.key_window.write();
        if *key == Some(window_id) {
            *key = self.window_order.read().last().copied();
        }
        drop(key);

        self.notify(MuxNotification::WindowRemoved(window_id));
        if self.window_order.read().is_empty() {
            // Closing the last window is a terminal event the host may
            // act upon.
            self.notify(MuxNotification::Empty);
        }
        self.focus_changed();
        Ok(window_id)
    }

    pub fn move_workspace_to_window(
        &self,
        workspace: &Handle,
        window: &Handle,
    ) -> Result<(WorkspaceId, WindowId)> {
        let workspace_id = self.resolve_workspace(workspace)?;
        let target_window = self.resolve_window(window)?;

        let source_window = self
            .workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.window_id())
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;

        if source_window == target_window {
            return Ok((workspace_id, target_window));
        }

        {
            let mut windows = self.windows.write();
            if let Some(source) = windows.get_mut(&source_window) {
                source.remove(workspace_id);
            }
            windows
                .get_mut(&target_window)
                .ok_or_else(|| MuxError::not_found(format!("window {}", target_window)))?
                .push(workspace_id);
        }
        if let Some(ws) = self.workspaces.write().get_mut(&workspace_id) {
            ws.set_window_id(target_window);
        }

        self.notify(MuxNotification::WorkspaceMoved {
            workspace_id,
            window_id: target_window,
        });
        self.focus_changed();
        Ok((workspace_id, target_window))
    }

    // ----- workspace operations -----

    /// Create a workspace (with root pane + terminal surface) in the given
    /// window (default: key window), select it, and focus its surface.
    pub fn new_workspace(&self, window: Option<&Handle>, title: Option<String>) -> Result<WorkspaceId> {
        let window_id = self.resolve_window(window.unwrap_or(&Handle::Current))?;
        let workspace_id = self.build_workspace(window_id, title);
        {
            let mut windows = self.windows.write();
            let window = windows
                .get_mut(&window_id)
                .ok_or_else(|| MuxError::not_found(format!("window {}", window_id)))?;
            window.push(workspace_id);
            window.select(workspace_id);
        }
        self.notify(MuxNotification::WorkspaceCreated {
            window_id,
            workspace_id,
        });
        self.focus_changed();
        Ok(workspace_id)
    }

    pub fn list_workspaces(&self, window: Option<&Handle>) -> Result<Vec<WorkspaceEntry>> {
        let window_ids: Vec<WindowId> = match window {
            Some(h) => vec![self.resolve_window(h)?],
            None => self.window_order.read().clone(),
        };
        let windows = self.windows.read();
        let workspaces = self.workspaces.read();
        let mut out = vec![];
        for window_id in window_ids {
            if let Some(win) = windows.get(&window_id) {
                for &ws_id in win.workspaces() {
                    if let Some(ws) = workspaces.get(&ws_id) {
                        out.push(WorkspaceEntry::from_workspace(
                            ws,
                            win.selected_workspace() == Some(ws_id),
                        ));
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn current_workspace(&self) -> Result<WorkspaceEntry> {
        let workspace_id = self.resolve_workspace(&Handle::Current)?;
        let workspaces = self.workspaces.read();
        let ws = workspaces
            .get(&workspace_id)
            .ok_or_else(|| MuxError::not_found("current workspace"))?;
        Ok(WorkspaceEntry::from_workspace(ws, true))
    }

    pub fn select_workspace(&self, handle: &Handle) -> Result<WorkspaceId> {
        let workspace_id = self.resolve_workspace(handle)?;
        let window_id = self
            .workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.window_id())
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;
        self.windows
            .write()
            .get_mut(&window_id)
            .map(|w| w.select(workspace_id));
        self.key_window.write().replace(window_id);
        self.notify(MuxNotification::WorkspaceSelected {
            window_id,
            workspace_id,
        });
        self.focus_changed();
        Ok(workspace_id)
    }

    pub fn close_workspace(&self, handle: &Handle) -> Result<WorkspaceId> {
        let workspace_id = self.resolve_workspace(handle)?;
        let window_id = self
            .workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.window_id())
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;

        self.windows
            .write()
            .get_mut(&window_id)
            .map(|w| w.remove(workspace_id));
        self.destroy_workspace(workspace_id);
        self.notify(MuxNotification::WorkspaceRemoved(workspace_id));
        // Closing the last workspace leaves the window empty and emits no
        // focus change.
        if self
            .windows
            .read()
            .get(&window_id)
            .map(|w| !w.is_empty())
            .unwrap_or(false)
        {
            self.focus_changed();
        }
        Ok(workspace_id)
    }

    pub fn reorder_workspace(
        &self,
        handle: &Handle,
        position: &Position,
        window: Option<&Handle>,
    ) -> Result<usize> {
        if position.is_empty() {
            return Err(MuxError::MissingPosition);
        }
        let workspace_id = self.resolve_workspace(handle)?;
        let window_id = match window {
            Some(h) => self.resolve_window(h)?,
            None => self
                .workspaces
                .read()
                .get(&workspace_id)
                .map(|ws| ws.window_id())
                .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?,
        };

        let siblings: Vec<WorkspaceId> = {
            let windows = self.windows.read();
            let win = windows
                .get(&window_id)
                .ok_or_else(|| MuxError::not_found(format!("window {}", window_id)))?;
            win.workspaces()
                .iter()
                .copied()
                .filter(|&id| id != workspace_id)
                .collect()
        };
        let index = self.resolve_position(position, &siblings, |h| self.resolve_workspace(h))?;

        let moved = self
            .windows
            .write()
            .get_mut(&window_id)
            .map(|w| w.reorder(workspace_id, index))
            .unwrap_or(false);
        if !moved {
            return Err(MuxError::ConstraintViolation(format!(
                "workspace {} is not in window {}",
                workspace_id, window_id
            )));
        }
        self.notify(MuxNotification::WorkspaceMoved {
            workspace_id,
            window_id,
        });
        Ok(index)
    }

    pub fn set_status(&self, workspace: &Handle, key: &str, indicator: StatusIndicator) -> Result<()> {
        let workspace_id = self.resolve_workspace(workspace)?;
        self.workspaces
            .write()
            .get_mut(&workspace_id)
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?
            .set_status(key, indicator);
        self.notify(MuxNotification::WorkspaceStatusChanged(workspace_id));
        Ok(())
    }

    pub fn clear_status(&self, workspace: &Handle, key: &str) -> Result<bool> {
        let workspace_id = self.resolve_workspace(workspace)?;
        let cleared = self
            .workspaces
            .write()
            .get_mut(&workspace_id)
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?
            .clear_status(key);
        if cleared {
            self.notify(MuxNotification::WorkspaceStatusChanged(workspace_id));
        }
        Ok(cleared)
    }

    // ----- pane operations -----

    pub fn list_panes(&self, workspace: Option<&Handle>) -> Result<Vec<PaneEntry>> {
        let workspace_id = self.resolve_workspace(workspace.unwrap_or(&Handle::Current))?;
        let workspaces = self.workspaces.read();
        let ws = workspaces
            .get(&workspace_id)
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;
        let panes = self.panes.read();
        Ok(ws
            .tree()
            .all_panes()
            .iter()
            .filter_map(|id| panes.get(id))
            .map(|p| PaneEntry::from_pane(p, p.pane_id() == ws.focused_pane()))
            .collect())
    }

    /// Focus a pane; this also selects its current surface and the chain
    /// of containers above it.
    pub fn focus_pane(&self, handle: &Handle) -> Result<PaneId> {
        let pane_id = self.resolve_pane(handle)?;
        let workspace_id = self
            .panes
            .read()
            .get(&pane_id)
            .map(|p| p.workspace_id())
            .ok_or_else(|| MuxError::not_found(format!("pane {}", pane_id)))?;
        let window_id = self
            .workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.window_id())
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;

        self.workspaces
            .write()
            .get_mut(&workspace_id)
            .map(|ws| ws.set_focused_pane(pane_id));
        self.windows.write().get_mut(&window_id).map(|w| w.select(workspace_id));
        self.key_window.write().replace(window_id);

        self.notify(MuxNotification::PaneFocused(pane_id));
        if let Some(surface_id) = self.panes.read().get(&pane_id).and_then(|p| p.selected_surface()) {
            self.notify(MuxNotification::SurfaceFocused(surface_id));
        }
        self.focus_changed();
        Ok(pane_id)
    }

    /// Split the target pane, creating a fresh pane populated with a new
    /// surface of `kind`.  Returns (new pane, new surface).
    pub fn split_pane(
        &self,
        pane: Option<&Handle>,
        direction: SplitDirection,
        kind: PanelKind,
    ) -> Result<(PaneId, SurfaceId)> {
        let pane_id = self.resolve_pane(pane.unwrap_or(&Handle::Current))?;
        let workspace_id = self
            .panes
            .read()
            .get(&pane_id)
            .map(|p| p.workspace_id())
            .ok_or_else(|| MuxError::not_found(format!("pane {}", pane_id)))?;

        let new_pane_id = self.build_pane(workspace_id);
        {
            let mut workspaces = self.workspaces.write();
            let ws = workspaces
                .get_mut(&workspace_id)
                .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;
            ws.tree_mut().split_pane(
                pane_id,
                direction.orientation(),
                direction.insert_first(),
                new_pane_id,
            )?;
        }
        let surface_id = self.build_surface(new_pane_id, kind);
        self.notify(MuxNotification::PaneAdded(new_pane_id));
        self.notify(MuxNotification::SurfaceAdded(surface_id));
        self.focus_pane(&Handle::Uuid(new_pane_id))?;
        Ok((new_pane_id, surface_id))
    }

    /// Create a new pane at the outer edge of the workspace and move the
    /// surface there.
    pub fn drag_surface_to_split(
        &self,
        surface: &Handle,
        direction: SplitDirection,
    ) -> Result<PaneId> {
        let surface_id = self.resolve_surface(surface)?;
        let source_pane = self
            .surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.pane_id())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        let workspace_id = self
            .panes
            .read()
            .get(&source_pane)
            .map(|p| p.workspace_id())
            .ok_or_else(|| MuxError::not_found(format!("pane {}", source_pane)))?;

        let new_pane_id = self.build_pane(workspace_id);
        self.workspaces
            .write()
            .get_mut(&workspace_id)
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?
            .tree_mut()
            .split_root(direction, new_pane_id);
        self.notify(MuxNotification::PaneAdded(new_pane_id));

        let request = MoveRequest {
            pane: Some(Handle::Uuid(new_pane_id)),
            focus: Some(true),
            ..Default::default()
        };
        self.move_surface(&Handle::Uuid(surface_id), &request)?;
        Ok(new_pane_id)
    }

    // ----- surface operations -----

    pub fn list_surfaces(&self, workspace: Option<&Handle>) -> Result<Vec<SurfaceEntry>> {
        let workspace_id = self.resolve_workspace(workspace.unwrap_or(&Handle::Current))?;
        let focus = self.focused();
        let workspaces = self.workspaces.read();
        let ws = workspaces
            .get(&workspace_id)
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;
        let panes = self.panes.read();
        let surfaces = self.surfaces.read();
        let mut out = vec![];
        for pane_id in ws.tree().all_panes() {
            if let Some(pane) = panes.get(&pane_id) {
                for &surface_id in pane.surfaces() {
                    if let Some(surface) = surfaces.get(&surface_id) {
                        out.push(SurfaceEntry::from_surface(
                            surface,
                            pane.selected_surface() == Some(surface_id),
                            focus.map(|f| f.surface_id == Some(surface_id)).unwrap_or(false),
                        ));
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn list_pane_surfaces(&self, pane: Option<&Handle>) -> Result<Vec<SurfaceEntry>> {
        let pane_id = self.resolve_pane(pane.unwrap_or(&Handle::Current))?;
        let focus = self.focused();
        let panes = self.panes.read();
        let pane = panes
            .get(&pane_id)
            .ok_or_else(|| MuxError::not_found(format!("pane {}", pane_id)))?;
        let surfaces = self.surfaces.read();
        Ok(pane
            .surfaces()
            .iter()
            .filter_map(|id| surfaces.get(id))
            .map(|s| {
                SurfaceEntry::from_surface(
                    s,
                    pane.selected_surface() == Some(s.surface_id()),
                    focus.map(|f| f.surface_id == Some(s.surface_id())).unwrap_or(false),
                )
            })
            .collect())
    }

    /// Create a surface in the target pane (default: focused pane),
    /// select and focus it.
    pub fn new_surface(&self, kind: PanelKind, pane: Option<&Handle>) -> Result<SurfaceId> {
        let pane_id = self.resolve_pane(pane.unwrap_or(&Handle::Current))?;
        let surface_id = self.build_surface(pane_id, kind);
        self.panes.write().get_mut(&pane_id).map(|p| p.select(surface_id));
        self.notify(MuxNotification::SurfaceAdded(surface_id));
        self.focus_pane(&Handle::Uuid(pane_id))?;
        Ok(surface_id)
    }

    pub fn focus_surface(&self, handle: &Handle) -> Result<SurfaceId> {
        let surface_id = self.resolve_surface(handle)?;
        let pane_id = self
            .surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.pane_id())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        self.panes.write().get_mut(&pane_id).map(|p| p.select(surface_id));
        self.focus_pane(&Handle::Uuid(pane_id))?;
        Ok(surface_id)
    }

    pub fn close_surface(&self, handle: &Handle) -> Result<SurfaceId> {
        let surface_id = self.resolve_surface(handle)?;
        let pane_id = self
            .surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.pane_id())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;

        self.remove_surface_from_pane(surface_id, pane_id);
        self.destroy_surface(surface_id);
        self.collapse_if_empty(pane_id);
        self.notify(MuxNotification::SurfaceRemoved(surface_id));
        self.focus_changed();
        Ok(surface_id)
    }

    pub fn reorder_surface(&self, handle: &Handle, position: &Position) -> Result<usize> {
        if position.is_empty() {
            return Err(MuxError::MissingPosition);
        }
        let surface_id = self.resolve_surface(handle)?;
        let pane_id = self
            .surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.pane_id())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;

        let siblings: Vec<SurfaceId> = {
            let panes = self.panes.read();
            let pane = panes
                .get(&pane_id)
                .ok_or_else(|| MuxError::not_found(format!("pane {}", pane_id)))?;
            pane.surfaces()
                .iter()
                .copied()
                .filter(|&id| id != surface_id)
                .collect()
        };
        let index = self.resolve_position(position, &siblings, |h| self.resolve_surface(h))?;

        self.panes
            .write()
            .get_mut(&pane_id)
            .map(|p| p.reorder(surface_id, index));
        self.notify(MuxNotification::SurfaceMoved(surface_id));
        Ok(index)
    }

    pub fn move_surface(&self, handle: &Handle, request: &MoveRequest) -> Result<MoveResult> {
        let surface_id = self.resolve_surface(handle)?;
        let source_pane = self
            .surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.pane_id())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;

        // Resolve the target pane, deriving it from workspace/window
        // scope when no pane handle was provided.
        let target_pane = match &request.pane {
            Some(h) => self.resolve_pane(h)?,
            None => {
                let workspace_id = match (&request.workspace, &request.window) {
                    (Some(ws), _) => self.resolve_workspace(ws)?,
                    (None, Some(win)) => {
                        let window_id = self.resolve_window(win)?;
                        self.windows
                            .read()
                            .get(&window_id)
                            .and_then(|w| w.selected_workspace())
                            .ok_or_else(|| {
                                MuxError::not_found(format!("window {} has no workspace", window_id))
                            })?
                    }
                    (None, None) => self.resolve_workspace(&Handle::Current)?,
                };
                self.workspaces
                    .read()
                    .get(&workspace_id)
                    .map(|ws| ws.focused_pane())
                    .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?
            }
        };

        let source_window = self.window_of_pane(source_pane)?;
        let target_window = self.window_of_pane(target_pane)?;
        if source_window != target_window && request.window.is_none() {
            return Err(MuxError::ConstraintViolation(
                "moving a surface across windows requires an explicit window handle".to_string(),
            ));
        }

        let was_focused = self
            .focused()
            .map(|f| f.surface_id == Some(surface_id))
            .unwrap_or(false);

        let target_workspace = self
            .panes
            .read()
            .get(&target_pane)
            .map(|p| p.workspace_id())
            .ok_or_else(|| MuxError::not_found(format!("pane {}", target_pane)))?;

        if source_pane != target_pane {
            self.remove_surface_from_pane(surface_id, source_pane);
            self.surfaces
                .write()
                .get_mut(&surface_id)
                .map(|s| s.set_pane_id(target_pane));
        }

        // Insert at the requested position: index, else after, else
        // before, else append.
        let siblings: Vec<SurfaceId> = {
            let panes = self.panes.read();
            let pane = panes
                .get(&target_pane)
                .ok_or_else(|| MuxError::not_found(format!("pane {}", target_pane)))?;
            pane.surfaces()
                .iter()
                .copied()
                .filter(|&id| id != surface_id)
                .collect()
        };
        let index = if request.position.is_empty() {
            siblings.len()
        } else {
            self.resolve_position(&request.position, &siblings, |h| self.resolve_surface(h))?
        };
        {
            let mut panes = self.panes.write();
            if let Some(pane) = panes.get_mut(&target_pane) {
                if source_pane == target_pane {
                    pane.reorder(surface_id, index);
                } else {
                    pane.insert(index, surface_id);
                }
            }
        }

        if source_pane != target_pane {
            self.collapse_if_empty(source_pane);
        }
        self.notify(MuxNotification::SurfaceMoved(surface_id));

        let should_focus = request.focus.unwrap_or(was_focused);
        if should_focus {
            self.focus_surface(&Handle::Uuid(surface_id))?;
        } else {
            self.focus_changed();
        }

        let surfaces = self.surfaces.read();
        let panes = self.panes.read();
        let workspaces = self.workspaces.read();
        let windows = self.windows.read();
        let surface = surfaces
            .get(&surface_id)
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        let pane = panes
            .get(&target_pane)
            .ok_or_else(|| MuxError::not_found(format!("pane {}", target_pane)))?;
        let ws = workspaces
            .get(&target_workspace)
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", target_workspace)))?;
        let win = windows
            .get(&target_window)
            .ok_or_else(|| MuxError::not_found(format!("window {}", target_window)))?;
        Ok(MoveResult {
            surface_id,
            surface_ref: surface.ref_string(),
            pane_id: target_pane,
            pane_ref: pane.ref_string(),
            workspace_id: target_workspace,
            workspace_ref: ws.ref_string(),
            window_id: target_window,
            window_ref: win.ref_string(),
            index: pane.idx_of(surface_id).unwrap_or(index),
        })
    }

    pub fn trigger_flash(
        &self,
        workspace: Option<&Handle>,
        surface: Option<&Handle>,
    ) -> Result<SurfaceId> {
        let surface_id = match surface {
            Some(h) => self.resolve_surface(h)?,
            None => {
                let workspace_id = self.resolve_workspace(workspace.unwrap_or(&Handle::Current))?;
                let workspaces = self.workspaces.read();
                let ws = workspaces
                    .get(&workspace_id)
                    .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;
                self.panes
                    .read()
                    .get(&ws.focused_pane())
                    .and_then(|p| p.selected_surface())
                    .ok_or_else(|| MuxError::not_found("no surface to flash"))?
            }
        };
        let workspace_id = self.workspace_of_surface(surface_id)?;
        if let Some(surface) = self.surfaces.read().get(&surface_id) {
            self.host().flash(surface.panel());
        }
        self.notify(MuxNotification::SurfaceFlash {
            workspace_id,
            surface_id,
        });
        Ok(surface_id)
    }

    pub fn send_text(&self, surface: Option<&Handle>, text: &str) -> Result<()> {
        let surface_id = self.resolve_surface(surface.unwrap_or(&Handle::Current))?;
        let surfaces = self.surfaces.read();
        let surface = surfaces
            .get(&surface_id)
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        self.host()
            .send_text(surface.panel(), text)
            .map_err(|e| MuxError::NotSupported(e.to_string()))
    }

    pub fn send_key(&self, surface: Option<&Handle>, key: &str) -> Result<()> {
        let surface_id = self.resolve_surface(surface.unwrap_or(&Handle::Current))?;
        let surfaces = self.surfaces.read();
        let surface = surfaces
            .get(&surface_id)
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        self.host()
            .send_key(surface.panel(), key)
            .map_err(|e| MuxError::NotSupported(e.to_string()))
    }

    pub fn refresh_surfaces(&self) -> usize {
        let host = self.host();
        let surfaces = self.surfaces.read();
        for surface in surfaces.values() {
            host.refresh(surface.panel());
        }
        surfaces.len()
    }

    pub fn surface_health(&self, workspace: Option<&Handle>) -> Result<Vec<(SurfaceEntry, bool)>> {
        let entries = self.list_surfaces(workspace)?;
        let host = self.host();
        let surfaces = self.surfaces.read();
        Ok(entries
            .into_iter()
            .map(|entry| {
                let healthy = surfaces
                    .get(&entry.surface_id)
                    .map(|s| host.is_healthy(s.panel()))
                    .unwrap_or(false);
                (entry, healthy)
            })
            .collect())
    }

    /// Find an existing browser surface in the workspace, preferring the
    /// focused pane's selection order.
    pub fn find_browser_surface(&self, workspace: &Handle) -> Result<Option<SurfaceId>> {
        Ok(self
            .list_surfaces(Some(workspace))?
            .into_iter()
            .find(|s| s.kind == PanelKind::Browser)
            .map(|s| s.surface_id))
    }

    pub fn surface_entry(&self, surface_id: SurfaceId) -> Result<SurfaceEntry> {
        let focus = self.focused();
        let surfaces = self.surfaces.read();
        let surface = surfaces
            .get(&surface_id)
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        let panes = self.panes.read();
        let selected = panes
            .get(&surface.pane_id())
            .map(|p| p.selected_surface() == Some(surface_id))
            .unwrap_or(false);
        Ok(SurfaceEntry::from_surface(
            surface,
            selected,
            focus.map(|f| f.surface_id == Some(surface_id)).unwrap_or(false),
        ))
    }

    pub fn surface_kind(&self, surface_id: SurfaceId) -> Result<PanelKind> {
        self.surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.kind())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))
    }

    pub fn set_surface_title(&self, surface_id: SurfaceId, title: &str) -> Result<()> {
        let mut surfaces = self.surfaces.write();
        let surface = surfaces
            .get_mut(&surface_id)
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        surface.set_title(title);
        self.host().set_title(surface.panel(), title);
        Ok(())
    }

    pub fn workspace_of_surface(&self, surface_id: SurfaceId) -> Result<WorkspaceId> {
        let pane_id = self
            .surfaces
            .read()
            .get(&surface_id)
            .map(|s| s.pane_id())
            .ok_or_else(|| MuxError::not_found(format!("surface {}", surface_id)))?;
        self.panes
            .read()
            .get(&pane_id)
            .map(|p| p.workspace_id())
            .ok_or_else(|| MuxError::not_found(format!("pane {}", pane_id)))
    }

    // ----- notifications -----

    pub fn add_notification(
        &self,
        workspace: &Handle,
        surface: Option<&Handle>,
        title: &str,
        subtitle: &str,
        body: &str,
    ) -> Result<NotificationId> {
        let workspace_id = self.resolve_workspace(workspace)?;
        let surface_id = match surface {
            Some(h) => Some(self.resolve_surface(h)?),
            None => None,
        };
        let id = self
            .notifications
            .lock()
            .add(workspace_id, surface_id, title, subtitle, body);
        // A notification aimed at the focused tuple while the app is
        // active is immediately read.
        if self.is_app_active() {
            self.mark_read_for_current_focus();
        }
        self.notify(MuxNotification::NotificationAdded(id));
        Ok(id)
    }

    pub fn list_notifications(&self) -> Vec<Notification> {
        self.notifications.lock().list().to_vec()
    }

    pub fn clear_notifications(&self) -> usize {
        let count = self.notifications.lock().clear_all();
        self.notify(MuxNotification::NotificationsCleared);
        count
    }

    pub fn remove_notification(&self, id: NotificationId) -> bool {
        self.notifications.lock().remove(id)
    }

    pub fn mark_notification_read(&self, id: NotificationId) -> bool {
        self.notifications.lock().mark_read(id)
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.lock().unread_count()
    }

    pub fn latest_unread(&self) -> Option<Notification> {
        self.notifications.lock().latest_unread().cloned()
    }

    /// Answer where focusing this notification should land.
    pub fn focus_for_notification(
        &self,
        id: NotificationId,
    ) -> Result<(WindowId, WorkspaceId, Option<SurfaceId>)> {
        let (workspace_id, surface_id) = {
            let notifications = self.notifications.lock();
            let n = notifications
                .get(id)
                .ok_or_else(|| MuxError::not_found(format!("notification {}", id)))?;
            (n.workspace_id, n.surface_id)
        };
        let window_id = self
            .workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.window_id())
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))?;
        Ok((window_id, workspace_id, surface_id))
    }

    // ----- identify -----

    pub fn identify(&self, caller: Option<String>) -> Result<IdentifyResult> {
        let focus = self.focused().ok_or_else(|| MuxError::not_found("nothing focused"))?;
        let windows = self.windows.read();
        let workspaces = self.workspaces.read();
        let panes = self.panes.read();
        let surfaces = self.surfaces.read();
        let window = windows
            .get(&focus.window_id)
            .ok_or_else(|| MuxError::not_found("key window"))?;
        let ws = workspaces
            .get(&focus.workspace_id)
            .ok_or_else(|| MuxError::not_found("selected workspace"))?;
        let pane = panes
            .get(&focus.pane_id)
            .ok_or_else(|| MuxError::not_found("focused pane"))?;
        let surface = focus.surface_id.and_then(|id| surfaces.get(&id));
        Ok(IdentifyResult {
            window_id: focus.window_id,
            window_ref: window.ref_string(),
            workspace_id: focus.workspace_id,
            workspace_ref: ws.ref_string(),
            pane_id: focus.pane_id,
            pane_ref: pane.ref_string(),
            surface_id: focus.surface_id,
            surface_ref: surface.map(|s| s.ref_string()),
            caller,
        })
    }

    // ----- internals -----

    fn window_of_pane(&self, pane_id: PaneId) -> Result<WindowId> {
        let workspace_id = self
            .panes
            .read()
            .get(&pane_id)
            .map(|p| p.workspace_id())
            .ok_or_else(|| MuxError::not_found(format!("pane {}", pane_id)))?;
        self.workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.window_id())
            .ok_or_else(|| MuxError::not_found(format!("workspace {}", workspace_id)))
    }

    fn resolve_position<R>(
        &self,
        position: &Position,
        siblings: &[Uuid],
        resolve: R,
    ) -> Result<usize>
    where
        R: Fn(&Handle) -> Result<Uuid>,
    {
        if let Some(index) = position.index {
            return Ok(index.min(siblings.len()));
        }
        if let Some(after) = &position.after {
            let id = resolve(after)?;
            let idx = siblings
                .iter()
                .position(|&s| s == id)
                .ok_or_else(|| MuxError::InvalidArgument("after target is not a sibling".to_string()))?;
            return Ok(idx + 1);
        }
        if let Some(before) = &position.before {
            let id = resolve(before)?;
            let idx = siblings
                .iter()
                .position(|&s| s == id)
                .ok_or_else(|| MuxError::InvalidArgument("before target is not a sibling".to_string()))?;
            return Ok(idx);
        }
        Err(MuxError::MissingPosition)
    }

    fn build_workspace(&self, window_id: WindowId, title: Option<String>) -> WorkspaceId {
        let pane_placeholder = Uuid::new_v4();
        let ws_ref = self.refs.workspace.fetch_add(1, Ordering::Relaxed) + 1;
        let title = title.unwrap_or_else(|| format!("Workspace {}", ws_ref));
        let mut ws = Workspace::new(ws_ref, window_id, title, pane_placeholder);
        let workspace_id = ws.workspace_id();
        self.refs
            .by_ref
            .write()
            .insert((RefKind::Workspace, ws_ref), workspace_id);

        let pane_id = self.build_pane(workspace_id);
        *ws.tree_mut() = SplitTree::new(pane_id);
        ws.set_focused_pane(pane_id);
        self.workspaces.write().insert(workspace_id, ws);

        let surface_id = self.build_surface(pane_id, PanelKind::Terminal);
        self.notify(MuxNotification::PaneAdded(pane_id));
        self.notify(MuxNotification::SurfaceAdded(surface_id));
        workspace_id
    }

    fn build_pane(&self, workspace_id: WorkspaceId) -> PaneId {
        let ref_no = self.refs.pane.fetch_add(1, Ordering::Relaxed) + 1;
        let pane = Pane::new(ref_no, workspace_id);
        let pane_id = pane.pane_id();
        self.refs.by_ref.write().insert((RefKind::Pane, ref_no), pane_id);
        self.panes.write().insert(pane_id, pane);
        pane_id
    }

    fn build_surface(&self, pane_id: PaneId, kind: PanelKind) -> SurfaceId {
        let ref_no = self.refs.surface.fetch_add(1, Ordering::Relaxed) + 1;
        let title = match kind {
            PanelKind::Terminal => "Terminal".to_string(),
            PanelKind::Browser => "Browser".to_string(),
        };
        let surface = Surface::new(ref_no, pane_id, kind, title);
        let surface_id = surface.surface_id();
        self.refs
            .by_ref
            .write()
            .insert((RefKind::Surface, ref_no), surface_id);
        self.surfaces.write().insert(surface_id, surface);
        self.panes.write().get_mut(&pane_id).map(|p| p.push(surface_id));
        surface_id
    }

    fn remove_surface_from_pane(&self, surface_id: SurfaceId, pane_id: PaneId) {
        self.panes.write().get_mut(&pane_id).map(|p| p.remove(surface_id));
    }

    fn destroy_surface(&self, surface_id: SurfaceId) {
        if let Some(surface) = self.surfaces.write().remove(&surface_id) {
            self.host().close(surface.panel());
        }
        self.refs.forget(surface_id);
    }

    /// Collapse a pane that has become empty, unless it is the root.
    /// Focus moves to the pane now occupying the removed pane's in-order
    /// index, else its predecessor.
    fn collapse_if_empty(&self, pane_id: PaneId) {
        let (workspace_id, empty) = match self.panes.read().get(&pane_id) {
            Some(p) => (p.workspace_id(), p.is_empty()),
            None => return,
        };
        if !empty {
            return;
        }
        let mut workspaces = self.workspaces.write();
        let ws = match workspaces.get_mut(&workspace_id) {
            Some(ws) => ws,
            None => return,
        };
        if ws.tree().is_root_pane(pane_id) {
            return;
        }
        let old_order = ws.tree().all_panes();
        let old_idx = old_order.iter().position(|&p| p == pane_id);
        if ws.tree_mut().remove_pane(pane_id).is_err() {
            return;
        }
        if ws.focused_pane() == pane_id {
            let order = ws.tree().all_panes();
            let idx = old_idx.unwrap_or(0).min(order.len().saturating_sub(1));
            if let Some(&next) = order.get(idx) {
                ws.set_focused_pane(next);
            }
        }
        drop(workspaces);
        self.panes.write().remove(&pane_id);
        self.refs.forget(pane_id);
        self.notify(MuxNotification::PaneRemoved(pane_id));
    }

    fn destroy_workspace(&self, workspace_id: WorkspaceId) {
        let pane_ids = self
            .workspaces
            .read()
            .get(&workspace_id)
            .map(|ws| ws.tree().all_panes())
            .unwrap_or_default();
        for pane_id in pane_ids {
            let surface_ids = self
                .panes
                .read()
                .get(&pane_id)
                .map(|p| p.surfaces().to_vec())
                .unwrap_or_default();
            for surface_id in surface_ids {
                self.destroy_surface(surface_id);
                self.notify(MuxNotification::SurfaceRemoved(surface_id));
            }
            self.panes.write().remove(&pane_id);
            self.refs.forget(pane_id);
            self.notify(MuxNotification::PaneRemoved(pane_id));
        }
        self.workspaces.write().remove(&workspace_id);
        self.refs.forget(workspace_id);
        self.notifications.lock().prune_workspace(workspace_id);
    }
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k9::assert_equal;

    fn mux_with_window() -> (Mux, WindowId) {
        let mux = Mux::new();
        let window_id = mux.new_window();
        (mux, window_id)
    }

    fn focused_surface(mux: &Mux) -> SurfaceId {
        mux.focused().unwrap().surface_id.unwrap()
    }

    #[test]
    fn new_window_is_key_and_has_one_surface() {
        let (mux, window_id) = mux_with_window();
        let windows = mux.list_windows();
        assert_equal!(windows.len(), 1);
        assert!(windows[0].is_key);
        assert_equal!(windows[0].window_ref, "window:1");
        assert_equal!(windows[0].workspace_count, 1);

        let focus = mux.focused().unwrap();
        assert_equal!(focus.window_id, window_id);
        assert!(focus.surface_id.is_some());

        let surfaces = mux.list_surfaces(None).unwrap();
        assert_equal!(surfaces.len(), 1);
        assert!(surfaces[0].is_selected);
    }

    #[test]
    fn refs_are_monotonic_and_not_reused() {
        let (mux, _) = mux_with_window();
        let s2 = mux.new_surface(PanelKind::Terminal, None).unwrap();
        assert_equal!(mux.surface_entry(s2).unwrap().surface_ref, "surface:2");

        mux.close_surface(&Handle::Uuid(s2)).unwrap();
        let s3 = mux.new_surface(PanelKind::Terminal, None).unwrap();
        assert_equal!(mux.surface_entry(s3).unwrap().surface_ref, "surface:3");

        // the dead ref no longer resolves
        let err = mux
            .resolve_surface(&Handle::Ref(RefKind::Surface, 2))
            .unwrap_err();
        assert_equal!(err.code(), "not_found");
    }

    #[test]
    fn focus_window_round_trip() {
        let (mux, w1) = mux_with_window();
        let w2 = mux.new_window();
        assert_equal!(mux.current_window().unwrap().window_id, w2);
        mux.focus_window(&Handle::Uuid(w1)).unwrap();
        assert_equal!(mux.current_window().unwrap().window_id, w1);
    }

    #[test]
    fn close_window_requires_force_when_occupied() {
        let (mux, w1) = mux_with_window();
        let err = mux.close_window(&Handle::Uuid(w1), false).unwrap_err();
        assert_equal!(err.code(), "has_workspaces");

        mux.close_window(&Handle::Uuid(w1), true).unwrap();
        assert!(mux.list_windows().is_empty());
        assert!(mux.focused().is_none());
    }

    #[test]
    fn new_surface_is_selected_in_pane() {
        let (mux, _) = mux_with_window();
        let s1 = focused_surface(&mux);
        let s2 = mux.new_surface(PanelKind::Terminal, None).unwrap();

        let listing = mux.list_pane_surfaces(None).unwrap();
        assert_equal!(listing.len(), 2);
        assert_equal!(listing[0].surface_id, s1);
        assert_equal!(listing[1].surface_id, s2);
        assert!(listing[1].is_selected);
        assert!(!listing[0].is_selected);
    }

    #[test]
    fn reorder_surface_by_index_keeps_focus() {
        let (mux, _) = mux_with_window();
        let s1 = focused_surface(&mux);
        let s2 = mux.new_surface(PanelKind::Terminal, None).unwrap();
        let s3 = mux.new_surface(PanelKind::Terminal, None).unwrap();
        mux.focus_surface(&Handle::Uuid(s2)).unwrap();

        // index 2 on the listing is s3; move it to the front
        mux.reorder_surface(
            &Handle::Index(2),
            &Position {
                index: Some(0),
                ..Default::default()
            },
        )
        .unwrap();

        let listing: Vec<SurfaceId> = mux
            .list_pane_surfaces(None)
            .unwrap()
            .iter()
            .map(|s| s.surface_id)
            .collect();
        assert_equal!(listing, vec![s3, s1, s2]);
        assert_equal!(focused_surface(&mux), s2);
    }

    #[test]
    fn reorder_without_position_fails() {
        let (mux, _) = mux_with_window();
        let err = mux
            .reorder_surface(&Handle::Current, &Position::default())
            .unwrap_err();
        assert_equal!(err.code(), "missing_position");
    }

    #[test]
    fn split_creates_pane_with_surface_and_focuses_it() {
        let (mux, _) = mux_with_window();
        let (pane, surface) = mux
            .split_pane(None, SplitDirection::Right, PanelKind::Terminal)
            .unwrap();
        let focus = mux.focused().unwrap();
        assert_equal!(focus.pane_id, pane);
        assert_equal!(focus.surface_id, Some(surface));

        let panes = mux.list_panes(None).unwrap();
        assert_equal!(panes.len(), 2);
        // new pane is on the right: second in canonical order
        assert_equal!(panes[1].pane_id, pane);
    }

    #[test]
    fn closing_last_surface_collapses_pane() {
        let (mux, _) = mux_with_window();
        let (pane, surface) = mux
            .split_pane(None, SplitDirection::Down, PanelKind::Terminal)
            .unwrap();
        assert_equal!(mux.list_panes(None).unwrap().len(), 2);

        mux.close_surface(&Handle::Uuid(surface)).unwrap();
        let panes = mux.list_panes(None).unwrap();
        assert_equal!(panes.len(), 1);
        assert!(panes.iter().all(|p| p.pane_id != pane));
        // focus fell back to the remaining pane
        assert_equal!(mux.focused().unwrap().pane_id, panes[0].pane_id);
    }

    #[test]
    fn move_surface_to_pane_at_index() {
        let (mux, _) = mux_with_window();
        let s1 = focused_surface(&mux);
        let (p2, _) = mux
            .split_pane(None, SplitDirection::Right, PanelKind::Terminal)
            .unwrap();

        let result = mux
            .move_surface(
                &Handle::Uuid(s1),
                &MoveRequest {
                    pane: Some(Handle::Uuid(p2)),
                    position: Position {
                        index: Some(0),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .unwrap();
        assert_equal!(result.pane_id, p2);
        assert_equal!(result.index, 0);

        let listing = mux
            .list_pane_surfaces(Some(&Handle::Uuid(p2)))
            .unwrap();
        assert_equal!(listing[0].surface_id, s1);
        // the source pane lost its only surface and collapsed
        assert_equal!(mux.list_panes(None).unwrap().len(), 1);
    }

    #[test]
    fn move_focused_surface_keeps_focus_by_default() {
        let (mux, _) = mux_with_window();
        let (p2, _) = mux
            .split_pane(None, SplitDirection::Right, PanelKind::Terminal)
            .unwrap();
        let s2 = mux.new_surface(PanelKind::Terminal, None).unwrap();
        assert_equal!(focused_surface(&mux), s2);

        let panes = mux.list_panes(None).unwrap();
        let p1 = panes.iter().find(|p| p.pane_id != p2).unwrap().pane_id;
        mux.move_surface(
            &Handle::Uuid(s2),
            &MoveRequest {
                pane: Some(Handle::Uuid(p1)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_equal!(focused_surface(&mux), s2);
        assert_equal!(mux.focused().unwrap().pane_id, p1);
    }

    #[test]
    fn move_across_windows_requires_window_handle() {
        let (mux, _w1) = mux_with_window();
        let s1 = focused_surface(&mux);
        let w2 = mux.new_window();
        let target_pane = mux.focused().unwrap().pane_id;

        let err = mux
            .move_surface(
                &Handle::Uuid(s1),
                &MoveRequest {
                    pane: Some(Handle::Uuid(target_pane)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_equal!(err.code(), "constraint_violation");

        mux.move_surface(
            &Handle::Uuid(s1),
            &MoveRequest {
                pane: Some(Handle::Uuid(target_pane)),
                window: Some(Handle::Uuid(w2)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_equal!(mux.workspace_of_surface(s1).unwrap(), {
            let focus = mux.focused().unwrap();
            focus.workspace_id
        });
    }

    #[test]
    fn workspace_reorder_round_trip() {
        let (mux, w1) = mux_with_window();
        let ws2 = mux.new_workspace(None, None).unwrap();
        let _ws3 = mux.new_workspace(None, None).unwrap();

        mux.reorder_workspace(
            &Handle::Uuid(ws2),
            &Position {
                index: Some(2),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        let listing = mux.list_workspaces(Some(&Handle::Uuid(w1))).unwrap();
        assert_equal!(listing[2].workspace_id, ws2);
    }

    #[test]
    fn closing_last_workspace_leaves_window_empty() {
        let (mux, w1) = mux_with_window();
        let ws = mux.current_workspace().unwrap().workspace_id;
        mux.close_workspace(&Handle::Uuid(ws)).unwrap();

        let windows = mux.list_windows();
        assert_equal!(windows.len(), 1);
        assert_equal!(windows[0].workspace_count, 0);
        assert_equal!(windows[0].window_id, w1);
        assert!(mux.focused().is_none());
    }

    #[test]
    fn move_workspace_between_windows() {
        let (mux, w1) = mux_with_window();
        let w2 = mux.new_window();
        let ws = mux
            .list_workspaces(Some(&Handle::Uuid(w1)))
            .unwrap()[0]
            .workspace_id;

        mux.move_workspace_to_window(&Handle::Uuid(ws), &Handle::Uuid(w2))
            .unwrap();
        assert!(mux.list_workspaces(Some(&Handle::Uuid(w1))).unwrap().is_empty());
        let in_w2 = mux.list_workspaces(Some(&Handle::Uuid(w2))).unwrap();
        assert_equal!(in_w2.len(), 2);
        assert!(in_w2.iter().any(|e| e.workspace_id == ws));
    }

    #[test]
    fn no_orphans_after_mutations() {
        let (mux, _) = mux_with_window();
        mux.split_pane(None, SplitDirection::Right, PanelKind::Browser)
            .unwrap();
        mux.new_surface(PanelKind::Terminal, None).unwrap();
        let s = focused_surface(&mux);
        mux.drag_surface_to_split(&Handle::Uuid(s), SplitDirection::Down)
            .unwrap();

        // every surface's pane exists and lists it; every pane's
        // workspace tree contains it
        let surfaces = mux.list_surfaces(None).unwrap();
        for entry in &surfaces {
            let pane_surfaces = mux
                .list_pane_surfaces(Some(&Handle::Uuid(entry.pane_id)))
                .unwrap();
            assert!(pane_surfaces.iter().any(|s| s.surface_id == entry.surface_id));
        }
        let panes = mux.list_panes(None).unwrap();
        for entry in &panes {
            assert!(mux.resolve_pane(&Handle::Uuid(entry.pane_id)).is_ok());
        }
    }

    #[test]
    fn drag_to_split_moves_surface_to_new_edge_pane() {
        let (mux, _) = mux_with_window();
        mux.new_surface(PanelKind::Terminal, None).unwrap();
        let s = focused_surface(&mux);

        let new_pane = mux
            .drag_surface_to_split(&Handle::Uuid(s), SplitDirection::Left)
            .unwrap();
        let panes = mux.list_panes(None).unwrap();
        assert_equal!(panes.len(), 2);
        // left edge: new pane is first in canonical order
        assert_equal!(panes[0].pane_id, new_pane);
        assert_equal!(mux.focused().unwrap().pane_id, new_pane);
        assert_equal!(focused_surface(&mux), s);
    }

    #[test]
    fn notifications_mark_read_on_activation() {
        let (mux, _) = mux_with_window();
        let ws = mux.current_workspace().unwrap().workspace_id;
        let sfc = focused_surface(&mux);

        mux.add_notification(&Handle::Uuid(ws), None, "t", "s", "b").unwrap();
        mux.add_notification(
            &Handle::Uuid(ws),
            Some(&Handle::Uuid(sfc)),
            "t2",
            "s2",
            "b2",
        )
        .unwrap();
        assert_equal!(mux.unread_count(), 2);

        // inactive: nothing marked
        mux.set_app_focus(Some(false));
        assert_equal!(mux.unread_count(), 2);

        // transition to active: one pass over the focused tuple
        mux.set_app_focus(Some(true));
        assert_equal!(mux.unread_count(), 0);
    }

    #[test]
    fn notification_routing_and_order() {
        let (mux, w1) = mux_with_window();
        let ws = mux.current_workspace().unwrap().workspace_id;
        let first = mux.add_notification(&Handle::Uuid(ws), None, "a", "", "").unwrap();
        let second = mux.add_notification(&Handle::Uuid(ws), None, "b", "", "").unwrap();

        let listing = mux.list_notifications();
        assert_equal!(listing[0].id, second);
        assert_equal!(listing[1].id, first);
        assert_equal!(listing[0].workspace_id, ws);

        let (win, wsid, sfc) = mux.focus_for_notification(first).unwrap();
        assert_equal!(win, w1);
        assert_equal!(wsid, ws);
        assert_equal!(sfc, None);
    }

    #[test]
    fn identify_reports_focused_tuple() {
        let (mux, _) = mux_with_window();
        let id = mux.identify(Some("test-caller".to_string())).unwrap();
        assert_equal!(id.window_ref, "window:1");
        assert_equal!(id.workspace_ref, "workspace:1");
        assert_equal!(id.pane_ref, "pane:1");
        assert_equal!(id.surface_ref, Some("surface:1".to_string()));
        assert_equal!(id.caller, Some("test-caller".to_string()));
    }

    #[test]
    fn status_indicators() {
        let (mux, _) = mux_with_window();
        mux.set_status(
            &Handle::Current,
            "claude",
            StatusIndicator {
                value: "Running".to_string(),
                icon: Some("sparkle".to_string()),
                color: Some("#ff8800".to_string()),
            },
        )
        .unwrap();
        let ws = mux.current_workspace().unwrap();
        assert_equal!(ws.status.get("claude").unwrap().value, "Running");

        assert!(mux.clear_status(&Handle::Current, "claude").unwrap());
        assert!(!mux.clear_status(&Handle::Current, "claude").unwrap());
    }
}
