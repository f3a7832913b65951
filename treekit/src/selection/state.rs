//! The selection state machine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{FocusableSelection, SelectionType, TreeSelection};
use crate::error::TreeError;
use crate::iterator::IterOptions;
use crate::node::{NodeData, NodeId};
use crate::tree::NodeStore;

/// Immutable selection history.
///
/// Every request produces a new state through [`next_state`](Self::next_state);
/// the previous state is never modified. The selected set is derived by
/// replaying the stack: toggles flip membership, ranges add every visible
/// node between their anchor and their node.
///
/// A `DEFAULT` request collapses the history into a single toggle entry, so
/// a well-formed stack never contains a `DEFAULT` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(rename = "selectionStack")]
    stack: Vec<FocusableSelection>,
}

impl SelectionState {
    /// The empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from an externally supplied stack.
    ///
    /// Fails if the stack contains a `DEFAULT` entry.
    pub fn from_stack(stack: Vec<FocusableSelection>) -> Result<Self, TreeError> {
        Self::check_no_default(&stack)?;
        Ok(Self { stack })
    }

    /// Fail if any entry is `DEFAULT`.
    pub fn check_no_default(stack: &[FocusableSelection]) -> Result<(), TreeError> {
        match stack
            .iter()
            .position(|entry| entry.kind == SelectionType::Default)
        {
            Some(position) => Err(TreeError::InvariantViolation(format!(
                "DEFAULT selection of `{}` at position {position} of {}",
                stack[position].node,
                stack.len()
            ))),
            None => Ok(()),
        }
    }

    pub fn stack(&self) -> &[FocusableSelection] {
        &self.stack
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub(crate) fn into_stack(self) -> Vec<FocusableSelection> {
        self.stack
    }

    /// The node of the most recent request.
    pub fn node(&self) -> Option<&NodeId> {
        self.stack.last().map(|entry| &entry.node)
    }

    /// The anchor the next range request extends from.
    pub fn focus(&self) -> Option<&NodeId> {
        self.stack
            .last()
            .map(|entry| entry.focus.as_ref().unwrap_or(&entry.node))
    }

    /// Apply a request.
    ///
    /// A range request without an anchor behaves like a `DEFAULT` request.
    /// A range request following a range replaces it, keeping its anchor and
    /// dropping earlier entries the replaced range covered.
    pub fn next_state<T: NodeData>(&self, store: &NodeStore<T>, request: &TreeSelection) -> Self {
        match request.kind {
            SelectionType::Default => Self {
                stack: vec![FocusableSelection::toggle(request.node.clone())],
            },
            SelectionType::Toggle => {
                let mut stack = self.stack.clone();
                stack.push(FocusableSelection::toggle(request.node.clone()));
                Self { stack }
            }
            SelectionType::Range => match self.focus() {
                Some(anchor) => self.extend_range(store, anchor.clone(), request.node.clone()),
                None => self.next_state(
                    store,
                    &TreeSelection::new(request.node.clone(), SelectionType::Default),
                ),
            },
        }
    }

    fn extend_range<T: NodeData>(
        &self,
        store: &NodeStore<T>,
        mut anchor: NodeId,
        node: NodeId,
    ) -> Self {
        let mut stack = self.stack.clone();
        if let Some(last) = stack.pop_if(|last| last.kind == SelectionType::Range) {
            let covered: HashSet<NodeId> = Self::selection_range(store, &anchor, &last.node)
                .into_iter()
                .collect();
            stack.retain(|entry| !covered.contains(&entry.node));
            anchor = last.focus.unwrap_or(last.node);
        }
        stack.push(FocusableSelection::new(node, SelectionType::Range, Some(anchor)));
        Self { stack }
    }

    /// The selected nodes, most recent first.
    ///
    /// Ids that no longer resolve to a selectable node are left out.
    pub fn selection<T: NodeData>(&self, store: &NodeStore<T>) -> Vec<NodeId> {
        let mut selected: Vec<NodeId> = Vec::new();
        let mut members: HashSet<NodeId> = HashSet::new();
        for entry in &self.stack {
            match entry.kind {
                SelectionType::Toggle => {
                    if members.remove(&entry.node) {
                        selected.retain(|id| *id != entry.node);
                    } else {
                        members.insert(entry.node.clone());
                        selected.push(entry.node.clone());
                    }
                }
                SelectionType::Range => {
                    let anchor = entry.focus.as_ref().unwrap_or(&entry.node);
                    for id in Self::selection_range(store, anchor, &entry.node) {
                        if members.insert(id.clone()) {
                            selected.push(id);
                        }
                    }
                }
                SelectionType::Default => {
                    members.clear();
                    selected.clear();
                    members.insert(entry.node.clone());
                    selected.push(entry.node.clone());
                }
            }
        }
        selected.reverse();
        selected.retain(|id| store.get(id.as_str()).is_some_and(|node| node.is_selectable()));
        selected
    }

    /// Selectable nodes on the visible path between `from` and `to`, both
    /// inclusive, in forward order.
    ///
    /// If only one end is visible, the range is that end alone.
    pub fn selection_range<T: NodeData>(
        store: &NodeStore<T>,
        from: &NodeId,
        to: &NodeId,
    ) -> Vec<NodeId> {
        let Some(root) = store.root_id() else {
            return Vec::new();
        };
        let mut range = Vec::new();
        let mut inside = false;
        let mut closed = false;
        for node in store.iter(root.as_str(), IterOptions::forward()) {
            let endpoint = node.id() == from || node.id() == to;
            if !inside {
                if !endpoint {
                    continue;
                }
                inside = true;
                range.push(node);
                if from == to {
                    closed = true;
                    break;
                }
                continue;
            }
            range.push(node);
            if endpoint {
                closed = true;
                break;
            }
        }
        if !closed {
            range.truncate(1);
        }
        range
            .into_iter()
            .filter(|node| node.is_selectable())
            .map(|node| node.id().clone())
            .collect()
    }
}
