//! The in-memory notification log: append-only, newest first, with
//! read-state.  Delivery to the OS is the host's concern; the core only
//! records scheduling intent and answers routing queries.

use crate::surface::SurfaceId;
use crate::workspace::WorkspaceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub workspace_id: WorkspaceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_id: Option<SurfaceId>,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
}

impl NotificationStore {
    /// Insert a new unread notification at the head of the log.
    pub fn add(
        &mut self,
        workspace_id: WorkspaceId,
        surface_id: Option<SurfaceId>,
        title: &str,
        subtitle: &str,
        body: &str,
    ) -> NotificationId {
        let id = Uuid::new_v4();
        self.items.insert(
            0,
            Notification {
                id,
                workspace_id,
                surface_id,
                title: title.to_string(),
                subtitle: subtitle.to_string(),
                body: body.to_string(),
                created_at: Utc::now(),
                is_read: false,
            },
        );
        id
    }

    pub fn list(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn clear_all(&mut self) -> usize {
        std::mem::take(&mut self.items).len()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    pub fn latest_unread(&self) -> Option<&Notification> {
        self.items.iter().find(|n| !n.is_read)
    }

    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_read_for_workspace(&mut self, workspace_id: WorkspaceId) -> usize {
        self.mark_read_where(|n| n.workspace_id == workspace_id)
    }

    pub fn mark_read_for_surface(&mut self, surface_id: SurfaceId) -> usize {
        self.mark_read_where(|n| n.surface_id == Some(surface_id))
    }

    /// Mark read every notification whose target matches the focused
    /// tuple: same workspace, and either untargeted or the focused surface.
    pub fn mark_read_for_focus(
        &mut self,
        workspace_id: WorkspaceId,
        surface_id: Option<SurfaceId>,
    ) -> usize {
        self.mark_read_where(|n| {
            n.workspace_id == workspace_id
                && (n.surface_id.is_none() || n.surface_id == surface_id)
        })
    }

    /// Drop notifications that referenced a workspace that no longer exists.
    pub fn prune_workspace(&mut self, workspace_id: WorkspaceId) {
        self.items.retain(|n| n.workspace_id != workspace_id);
    }

    fn mark_read_where(&mut self, pred: impl Fn(&Notification) -> bool) -> usize {
        let mut count = 0;
        for n in self.items.iter_mut() {
            if !n.is_read && pred(n) {
                n.is_read = true;
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_and_read_state() {
        let ws = Uuid::new_v4();
        let sfc = Uuid::new_v4();
        let mut store = NotificationStore::default();

        let a = store.add(ws, None, "first", "", "");
        let b = store.add(ws, Some(sfc), "second", "", "");
        assert_eq!(store.list()[0].id, b);
        assert_eq!(store.list()[1].id, a);
        assert_eq!(store.unread_count(), 2);
        assert_eq!(store.latest_unread().unwrap().id, b);

        assert!(store.mark_read(b));
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.latest_unread().unwrap().id, a);
    }

    #[test]
    fn focus_pass_matches_untargeted_and_focused_surface() {
        let ws = Uuid::new_v4();
        let focused = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut store = NotificationStore::default();

        store.add(ws, None, "untargeted", "", "");
        store.add(ws, Some(focused), "targeted", "", "");
        store.add(ws, Some(other), "elsewhere", "", "");
        store.add(Uuid::new_v4(), None, "other ws", "", "");

        let marked = store.mark_read_for_focus(ws, Some(focused));
        assert_eq!(marked, 2);
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn clear_and_remove() {
        let ws = Uuid::new_v4();
        let mut store = NotificationStore::default();
        let a = store.add(ws, None, "one", "", "");
        store.add(ws, None, "two", "", "");

        assert!(store.remove(a));
        assert!(!store.remove(a));
        assert_eq!(store.clear_all(), 1);
        assert_eq!(store.list().len(), 0);
    }
}
