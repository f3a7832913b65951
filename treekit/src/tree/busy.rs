//! Delayed, cancelable busy markers.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Tree;
use crate::node::{NodeData, NodeRef, TreeNode};

impl<T: NodeData> Tree<T> {
    /// Mark `node` busy after `delay` until `token` is cancelled.
    ///
    /// Nothing happens at call time. If `token` is cancelled before the delay
    /// elapses, the node is never touched. Otherwise the node's busy count is
    /// incremented when the delay elapses and decremented once `token` is
    /// cancelled; both changes fire [`on_did_change_busy`](Self::on_did_change_busy).
    ///
    /// Markers are independent: overlapping markers on one node each add
    /// and remove exactly one count. Replacing the root drops all pending
    /// markers of the previous tree.
    ///
    /// Returns `None` when called outside a tokio runtime.
    pub fn mark_as_busy(
        &self,
        node: &TreeNode<T>,
        delay: Duration,
        token: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            log::warn!("busy marker for `{}` ignored outside a tokio runtime", node.id);
            return None;
        };
        let node = node.node_ref();
        let scope = self.scope();
        let tree = self.downgrade();

        Some(handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = scope.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match tree.upgrade() {
                Some(tree) if tree.set_busy(&node, 1) => {}
                _ => return,
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = scope.cancelled() => return,
            }
            if let Some(tree) = tree.upgrade() {
                tree.set_busy(&node, -1);
            }
        }))
    }

    fn set_busy(&self, node: &NodeRef, delta: i32) -> bool {
        let changed = self.update(|store| {
            let current = store.resolve_mut(node)?;
            let busy = current.busy.saturating_add_signed(delta);
            if busy == current.busy {
                return None;
            }
            current.busy = busy;
            store.snapshot_ref(node)
        });
        match changed {
            Some(node) => {
                log::trace!("`{}` busy count is now {}", node.id, node.busy);
                self.inner.on_did_change_busy.fire(&node);
                true
            }
            None => false,
        }
    }
}
