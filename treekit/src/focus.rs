//! Input focus tracking.
//!
//! Focus is the node that keyboard navigation starts from. It is tracked
//! separately from selection: the selection service moves focus along with
//! every accepted request, but focus may also be set on its own.

use std::sync::{Arc, PoisonError, RwLock};

use crate::event::Emitter;
use crate::node::{NodeData, NodeRef, TreeNode};
use crate::tree::Tree;

/// Tracks which node of a tree has input focus.
///
/// Cloning yields a handle to the same focus state.
pub struct FocusService<T: NodeData> {
    tree: Tree<T>,
    focused: Arc<RwLock<Option<NodeRef>>>,
    on_did_change_focus: Emitter<Option<TreeNode<T>>>,
}

impl<T: NodeData> FocusService<T> {
    /// Creates a focus service with nothing focused.
    pub fn new(tree: Tree<T>) -> Self {
        Self {
            tree,
            focused: Arc::new(RwLock::new(None)),
            on_did_change_focus: Emitter::new(),
        }
    }

    /// The focused node, if it still exists under the current root.
    pub fn focused_node(&self) -> Option<TreeNode<T>> {
        let focused = self
            .focused
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        self.tree.read(|store| {
            store
                .validate_ref(&focused)
                .and_then(|node| store.snapshot(node.id().as_str()))
        })
    }

    /// Whether `node` is the focused node.
    pub fn has_focus(&self, node: &TreeNode<T>) -> bool {
        self.focused_node()
            .is_some_and(|focused| focused.same_node(node))
    }

    /// Move focus to `node`, or clear it.
    ///
    /// Fires [`on_did_change_focus`](Self::on_did_change_focus) only when the
    /// focused node actually changes.
    pub fn set_focus(&self, node: Option<&TreeNode<T>>) {
        let next = node.map(TreeNode::node_ref);
        {
            let mut focused = self
                .focused
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *focused == next {
                return;
            }
            *focused = next;
        }
        self.on_did_change_focus.fire(&node.cloned());
    }

    /// Fired with the newly focused node (or `None`) on every focus change.
    pub fn on_did_change_focus(&self) -> &Emitter<Option<TreeNode<T>>> {
        &self.on_did_change_focus
    }
}

impl<T: NodeData> Clone for FocusService<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            focused: Arc::clone(&self.focused),
            on_did_change_focus: self.on_did_change_focus.clone(),
        }
    }
}

impl<T: NodeData> std::fmt::Debug for FocusService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let focused = self
            .focused
            .read()
            .map(|focused| focused.as_ref().map(|node| node.id().clone()))
            .unwrap_or(None);
        f.debug_struct("FocusService")
            .field("focused", &focused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::node::NodeDescriptor;

    #[tokio::test]
    async fn test_focus_fires_only_on_change() {
        let tree: Tree<()> = Tree::new();
        tree.set_root(Some(
            NodeDescriptor::composite("root", ())
                .with_children(vec![NodeDescriptor::leaf("a", ())]),
        ))
        .await
        .unwrap();
        let focus = FocusService::new(tree.clone());
        let changes = Arc::new(AtomicUsize::new(0));
        let _subscription = {
            let changes = Arc::clone(&changes);
            focus.on_did_change_focus().subscribe(move |_| {
                changes.fetch_add(1, Ordering::SeqCst);
            })
        };

        let a = tree.get_node("a").unwrap();
        focus.set_focus(Some(&a));
        focus.set_focus(Some(&a));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert!(focus.has_focus(&a));

        focus.set_focus(None);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
        assert!(focus.focused_node().is_none());
    }

    #[tokio::test]
    async fn test_focus_on_removed_node_reads_as_none() {
        let tree: Tree<()> = Tree::new();
        tree.set_root(Some(NodeDescriptor::composite("root", ())))
            .await
            .unwrap();
        let focus = FocusService::new(tree.clone());
        focus.set_focus(tree.root().as_ref());

        tree.set_root(Some(NodeDescriptor::composite("root", ())))
            .await
            .unwrap();
        assert!(focus.focused_node().is_none());
    }
}
