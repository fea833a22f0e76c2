//! The per-workspace split tree.
//!
//! A proper binary tree: every internal node has exactly two children,
//! panes are the only leaves, and there is exactly one root.  Pane order
//! as observed by clients is the canonical in-order traversal.

use crate::error::{MuxError, Result};
use crate::pane::PaneId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitOrientation {
    Horizontal,
    Vertical,
}

/// An outward direction for root-level splits and drag gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SplitDirection {
    pub fn orientation(self) -> SplitOrientation {
        match self {
            SplitDirection::Left | SplitDirection::Right => SplitOrientation::Horizontal,
            SplitDirection::Up | SplitDirection::Down => SplitOrientation::Vertical,
        }
    }

    /// Whether the new pane lands in the first (left/top) slot.
    pub fn insert_first(self) -> bool {
        matches!(self, SplitDirection::Left | SplitDirection::Up)
    }
}

impl std::str::FromStr for SplitDirection {
    type Err = MuxError;
    fn from_str(s: &str) -> Result<SplitDirection> {
        match s {
            "left" => Ok(SplitDirection::Left),
            "right" => Ok(SplitDirection::Right),
            "up" | "top" => Ok(SplitDirection::Up),
            "down" | "bottom" => Ok(SplitDirection::Down),
            _ => Err(MuxError::InvalidArgument(format!(
                "invalid split direction {:?}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitNode {
    Leaf(PaneId),
    Split {
        orientation: SplitOrientation,
        ratio: f32,
        first: Box<SplitNode>,
        second: Box<SplitNode>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitTree {
    root: SplitNode,
}

impl SplitTree {
    pub fn new(root_pane: PaneId) -> Self {
        Self {
            root: SplitNode::Leaf(root_pane),
        }
    }

    pub fn root(&self) -> &SplitNode {
        &self.root
    }

    /// Canonical in-order traversal; indices are stable across clients.
    pub fn all_panes(&self) -> Vec<PaneId> {
        let mut out = vec![];
        collect_panes(&self.root, &mut out);
        out
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.all_panes().contains(&pane)
    }

    pub fn len(&self) -> usize {
        self.all_panes().len()
    }

    /// True when `pane` is the sole leaf, i.e. the tree root.
    pub fn is_root_pane(&self, pane: PaneId) -> bool {
        self.root == SplitNode::Leaf(pane)
    }

    /// Replace the leaf for `pane` with a split holding the original pane
    /// and `new_pane`, ordered per `insert_first`.
    pub fn split_pane(
        &mut self,
        pane: PaneId,
        orientation: SplitOrientation,
        insert_first: bool,
        new_pane: PaneId,
    ) -> Result<()> {
        if !split_leaf(&mut self.root, pane, orientation, insert_first, new_pane) {
            return Err(MuxError::not_found(format!("pane {} not in tree", pane)));
        }
        Ok(())
    }

    /// Split across the whole workspace: the existing tree becomes one side
    /// of a new root split and `new_pane` the other, per `direction`.
    pub fn split_root(&mut self, direction: SplitDirection, new_pane: PaneId) {
        let old = std::mem::replace(&mut self.root, SplitNode::Leaf(new_pane));
        let fresh = SplitNode::Leaf(new_pane);
        let (first, second) = if direction.insert_first() {
            (fresh, old)
        } else {
            (old, fresh)
        };
        self.root = SplitNode::Split {
            orientation: direction.orientation(),
            ratio: 0.5,
            first: Box::new(first),
            second: Box::new(second),
        };
    }

    /// Remove the leaf for `pane`; its parent split is replaced by the
    /// sibling subtree.  Fails on the root leaf: the root pane is never
    /// collapsed.
    pub fn remove_pane(&mut self, pane: PaneId) -> Result<()> {
        if self.is_root_pane(pane) {
            return Err(MuxError::ConstraintViolation(
                "cannot remove the root pane".to_string(),
            ));
        }
        let root = std::mem::replace(&mut self.root, SplitNode::Leaf(pane));
        match remove_leaf(root, pane) {
            (new_root, true) => {
                self.root = new_root;
                Ok(())
            }
            (old_root, false) => {
                self.root = old_root;
                Err(MuxError::not_found(format!("pane {} not in tree", pane)))
            }
        }
    }
}

fn collect_panes(node: &SplitNode, out: &mut Vec<PaneId>) {
    match node {
        SplitNode::Leaf(id) => out.push(*id),
        SplitNode::Split { first, second, .. } => {
            collect_panes(first, out);
            collect_panes(second, out);
        }
    }
}

fn split_leaf(
    node: &mut SplitNode,
    pane: PaneId,
    orientation: SplitOrientation,
    insert_first: bool,
    new_pane: PaneId,
) -> bool {
    match node {
        SplitNode::Leaf(id) if *id == pane => {
            let (first, second) = if insert_first {
                (SplitNode::Leaf(new_pane), SplitNode::Leaf(pane))
            } else {
                (SplitNode::Leaf(pane), SplitNode::Leaf(new_pane))
            };
            *node = SplitNode::Split {
                orientation,
                ratio: 0.5,
                first: Box::new(first),
                second: Box::new(second),
            };
            true
        }
        SplitNode::Leaf(_) => false,
        SplitNode::Split { first, second, .. } => {
            split_leaf(first, pane, orientation, insert_first, new_pane)
                || split_leaf(second, pane, orientation, insert_first, new_pane)
        }
    }
}

fn remove_leaf(node: SplitNode, pane: PaneId) -> (SplitNode, bool) {
    match node {
        SplitNode::Leaf(_) => (node, false),
        SplitNode::Split {
            orientation,
            ratio,
            first,
            second,
        } => {
            if *first == SplitNode::Leaf(pane) {
                return (*second, true);
            }
            if *second == SplitNode::Leaf(pane) {
                return (*first, true);
            }
            let (first, removed) = remove_leaf(*first, pane);
            if removed {
                return (
                    SplitNode::Split {
                        orientation,
                        ratio,
                        first: Box::new(first),
                        second,
                    },
                    true,
                );
            }
            let (second, removed) = remove_leaf(*second, pane);
            (
                SplitNode::Split {
                    orientation,
                    ratio,
                    first: Box::new(first),
                    second: Box::new(second),
                },
                removed,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id() -> PaneId {
        Uuid::new_v4()
    }

    #[test]
    fn split_and_order() {
        let (a, b, c) = (id(), id(), id());
        let mut tree = SplitTree::new(a);
        assert!(tree.is_root_pane(a));

        tree.split_pane(a, SplitOrientation::Horizontal, false, b)
            .unwrap();
        assert_eq!(tree.all_panes(), vec![a, b]);
        assert!(!tree.is_root_pane(a));

        // insert_first puts the new pane on the left/top
        tree.split_pane(b, SplitOrientation::Vertical, true, c).unwrap();
        assert_eq!(tree.all_panes(), vec![a, c, b]);
    }

    #[test]
    fn split_unknown_pane_fails() {
        let mut tree = SplitTree::new(id());
        let err = tree
            .split_pane(id(), SplitOrientation::Horizontal, false, id())
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn root_split_directions() {
        let (a, b, c) = (id(), id(), id());
        let mut tree = SplitTree::new(a);

        tree.split_root(SplitDirection::Right, b);
        assert_eq!(tree.all_panes(), vec![a, b]);

        tree.split_root(SplitDirection::Left, c);
        assert_eq!(tree.all_panes(), vec![c, a, b]);
        match tree.root() {
            SplitNode::Split { orientation, .. } => {
                assert_eq!(*orientation, SplitOrientation::Horizontal)
            }
            _ => panic!("expected root split"),
        }
    }

    #[test]
    fn collapse_promotes_sibling() {
        let (a, b, c) = (id(), id(), id());
        let mut tree = SplitTree::new(a);
        tree.split_pane(a, SplitOrientation::Horizontal, false, b)
            .unwrap();
        tree.split_pane(b, SplitOrientation::Vertical, false, c).unwrap();
        assert_eq!(tree.all_panes(), vec![a, b, c]);

        tree.remove_pane(b).unwrap();
        assert_eq!(tree.all_panes(), vec![a, c]);

        tree.remove_pane(c).unwrap();
        assert_eq!(tree.all_panes(), vec![a]);
        assert!(tree.is_root_pane(a));

        // the last leaf cannot be removed
        assert_eq!(
            tree.remove_pane(a).unwrap_err().code(),
            "constraint_violation"
        );
    }
}
