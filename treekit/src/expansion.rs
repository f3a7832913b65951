//! Expand and collapse.

use std::sync::Arc;

use futures::future::join_all;

use crate::error::TreeError;
use crate::event::{Emitter, NodeRefreshed, Subscription};
use crate::node::{NodeData, NodeRef, TreeNode};
use crate::tree::Tree;

/// Tracks expansion of expandable nodes.
///
/// Expanding resolves the node's children first, so a node never shows as
/// expanded with stale children. When configured, refreshing a composite
/// also refreshes its expanded composite children.
pub struct ExpansionService<T: NodeData> {
    tree: Tree<T>,
    on_expansion_changed: Emitter<TreeNode<T>>,
    _refreshed: Arc<Subscription>,
}

impl<T: NodeData> ExpansionService<T> {
    /// Creates an expansion service over `tree` and subscribes to its refreshes.
    pub fn new(tree: Tree<T>) -> Self {
        let weak = tree.downgrade();
        let refreshed = tree
            .on_node_refreshed()
            .subscribe(move |event: &NodeRefreshed<T>| {
                let Some(tree) = weak.upgrade() else {
                    return;
                };
                if !tree.config().refresh_expanded_children {
                    return;
                }
                let expanded: Vec<TreeNode<T>> = tree.read(|store| {
                    store
                        .children(event.node().id().as_str())
                        .filter(|child| child.is_composite() && child.is_expanded())
                        .cloned()
                        .collect()
                });
                if expanded.is_empty() {
                    return;
                }
                event.wait_until(async move {
                    let refreshes = expanded.iter().map(|child| tree.refresh(Some(child)));
                    for (child, result) in expanded.iter().zip(join_all(refreshes).await) {
                        if let Err(err) = result {
                            log::warn!("failed to refresh expanded `{}`: {err}", child.id());
                        }
                    }
                });
            });

        Self {
            tree,
            on_expansion_changed: Emitter::new(),
            _refreshed: Arc::new(refreshed),
        }
    }

    /// Resolve the children of a collapsed node and expand it.
    ///
    /// Returns the expanded node, or `None` if the node is stale or not
    /// collapsed. If resolution fails the node stays collapsed.
    pub async fn expand_node(&self, node: &TreeNode<T>) -> Result<Option<TreeNode<T>>, TreeError> {
        let Some(node) = self.tree.validate_node(node).filter(TreeNode::is_collapsed) else {
            return Ok(None);
        };
        if node.is_composite() {
            self.tree.refresh(Some(&node)).await?;
        }
        Ok(self.set_expanded(&node.node_ref(), true))
    }

    /// Collapse an expanded node. Returns `false` if nothing changed.
    pub fn collapse_node(&self, node: &TreeNode<T>) -> bool {
        self.tree
            .validate_node(node)
            .filter(TreeNode::is_expanded)
            .and_then(|node| self.set_expanded(&node.node_ref(), false))
            .is_some()
    }

    /// Collapse a node and every expanded node below it, deepest first.
    pub fn collapse_all(&self, node: &TreeNode<T>) -> bool {
        let Some(node) = self.tree.validate_node(node) else {
            return false;
        };
        let expanded: Vec<NodeRef> = self.tree.read(|store| {
            let mut order = Vec::new();
            let mut stack = vec![node.id().clone()];
            while let Some(id) = stack.pop() {
                if let Some(current) = store.get(id.as_str()) {
                    if current.is_expanded() {
                        order.push(current.node_ref());
                    }
                    stack.extend(current.children().iter().cloned());
                }
            }
            order
        });
        let mut changed = false;
        for node in expanded.iter().rev() {
            changed |= self.set_expanded(node, false).is_some();
        }
        changed
    }

    /// Expand a collapsed node or collapse an expanded one.
    pub async fn toggle_node_expansion(&self, node: &TreeNode<T>) -> Result<bool, TreeError> {
        let Some(node) = self.tree.validate_node(node) else {
            return Ok(false);
        };
        if node.is_expanded() {
            Ok(self.collapse_node(&node))
        } else {
            Ok(self.expand_node(&node).await?.is_some())
        }
    }

    /// Fired with the node whenever its expansion state changes.
    pub fn on_expansion_changed(&self) -> &Emitter<TreeNode<T>> {
        &self.on_expansion_changed
    }

    fn set_expanded(&self, node: &NodeRef, expanded: bool) -> Option<TreeNode<T>> {
        let changed = self.tree.update(|store| {
            let current = store.resolve_mut(node)?;
            if current.expanded? == expanded {
                return None;
            }
            current.expanded = Some(expanded);
            store.snapshot_ref(node)
        })?;
        log::debug!(
            "`{}` {}",
            changed.id(),
            if expanded { "expanded" } else { "collapsed" }
        );
        self.on_expansion_changed.fire(&changed);
        Some(changed)
    }
}

impl<T: NodeData> Clone for ExpansionService<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            on_expansion_changed: self.on_expansion_changed.clone(),
            _refreshed: Arc::clone(&self._refreshed),
        }
    }
}

impl<T: NodeData> std::fmt::Debug for ExpansionService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpansionService").finish_non_exhaustive()
    }
}
