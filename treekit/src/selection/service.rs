//! Selection applied to a tree.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use super::{SelectionState, TreeSelection};
use crate::error::TreeError;
use crate::event::Emitter;
use crate::focus::FocusService;
use crate::iterator::IterOptions;
use crate::node::{NodeData, NodeId, TreeNode};
use crate::tree::Tree;

/// Owns the selection state of one tree.
///
/// Cloning yields a handle to the same selection.
pub struct SelectionService<T: NodeData> {
    tree: Tree<T>,
    focus: FocusService<T>,
    state: Arc<RwLock<SelectionState>>,
    on_selection_changed: Emitter<Vec<TreeNode<T>>>,
}

impl<T: NodeData> SelectionService<T> {
    /// Creates a service with an empty selection that moves `focus` along with it.
    pub fn new(tree: Tree<T>, focus: FocusService<T>) -> Self {
        Self {
            tree,
            focus,
            state: Arc::new(RwLock::new(SelectionState::new())),
            on_selection_changed: Emitter::new(),
        }
    }

    /// The current selection state.
    pub fn state(&self) -> SelectionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Selected nodes, most recently selected first.
    pub fn selected_nodes(&self) -> Vec<TreeNode<T>> {
        let state = self.state();
        self.tree.read(|store| {
            state
                .selection(store)
                .iter()
                .filter_map(|id| store.snapshot(id.as_str()))
                .collect()
        })
    }

    /// Apply a selection request and move focus to its node.
    ///
    /// Returns `false` without changing anything if the node is unknown or
    /// not selectable.
    pub fn add_selection(&self, selection: TreeSelection) -> bool {
        let Some(node) = self
            .tree
            .get_node(selection.node.as_str())
            .filter(TreeNode::is_selectable)
        else {
            log::debug!("ignoring selection of unknown node `{}`", selection.node);
            return false;
        };
        let next = self
            .tree
            .read(|store| self.state().next_state(store, &selection));
        self.transite_to(next);
        self.focus.set_focus(Some(&node));
        true
    }

    /// Deselect everything.
    pub fn clear_selection(&self) {
        self.transite_to(SelectionState::new());
    }

    /// Re-apply the `selected` flags after the tree's structure changed.
    pub(crate) fn sync_flags(&self) {
        let state = self.state();
        self.tree.update(|store| {
            let selected: HashSet<NodeId> = state.selection(store).into_iter().collect();
            let ids: Vec<NodeId> = store
                .root_id()
                .map(|root| {
                    let everything = IterOptions::forward()
                        .with_prune_collapsed(false)
                        .with_prune_invisible(false);
                    store
                        .iter(root.as_str(), everything)
                        .filter(|node| node.is_selectable())
                        .map(|node| node.id().clone())
                        .collect()
                })
                .unwrap_or_default();
            for id in ids {
                if let Some(node) = store.get_mut(id.as_str()) {
                    node.selected = Some(selected.contains(&id));
                }
            }
        });
    }

    fn transite_to(&self, next: SelectionState) {
        let previous = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == next {
                return;
            }
            std::mem::replace(&mut *state, next.clone())
        };

        let selected = self.tree.update(|store| {
            let old = previous.selection(store);
            let new = next.selection(store);
            for id in &old {
                if let Some(node) = store.get_mut(id.as_str()) {
                    node.selected = Some(false);
                }
            }
            for id in &new {
                if let Some(node) = store.get_mut(id.as_str()) {
                    node.selected = Some(true);
                }
            }
            new.iter()
                .filter_map(|id| store.snapshot(id.as_str()))
                .collect::<Vec<_>>()
        });
        log::debug!("selection changed ({} selected)", selected.len());
        self.on_selection_changed.fire(&selected);
    }

    /// Fired with the selected nodes, most recent first, whenever the
    /// selection state changes.
    pub fn on_selection_changed(&self) -> &Emitter<Vec<TreeNode<T>>> {
        &self.on_selection_changed
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Snapshot of the selection stack for persistence.
    pub fn store_state(&self) -> SelectionState {
        self.state()
    }

    /// Replace the selection with a persisted one.
    ///
    /// Entries whose node no longer exists are dropped, anchors that no
    /// longer exist are cleared, and focus moves to the node of the last
    /// remaining entry. A stack containing `DEFAULT` entries is rejected
    /// without touching the current selection.
    pub fn restore_state(&self, state: SelectionState) -> Result<(), TreeError> {
        SelectionState::check_no_default(state.stack())?;
        let stack = self.tree.read(|store| {
            state
                .into_stack()
                .into_iter()
                .filter(|entry| store.contains(entry.node.as_str()))
                .map(|mut entry| {
                    if entry
                        .focus
                        .as_ref()
                        .is_some_and(|focus| !store.contains(focus.as_str()))
                    {
                        entry.focus = None;
                    }
                    entry
                })
                .collect::<Vec<_>>()
        });
        let restored = SelectionState::from_stack(stack)?;
        let focus = restored
            .node()
            .and_then(|id| self.tree.get_node(id.as_str()));
        self.transite_to(restored);
        self.focus.set_focus(focus.as_ref());
        Ok(())
    }
}

impl<T: NodeData> Clone for SelectionService<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            focus: self.focus.clone(),
            state: Arc::clone(&self.state),
            on_selection_changed: self.on_selection_changed.clone(),
        }
    }
}

impl<T: NodeData> std::fmt::Debug for SelectionService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionService")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
