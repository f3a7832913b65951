//! Multi-mode selection.
//!
//! Selection is derived from a stack of requests rather than stored as a
//! set. [`SelectionState`] is the pure state machine over that stack;
//! [`SelectionService`] applies it to a tree, keeps the nodes' `selected`
//! flags in sync and raises change events.

mod service;
mod state;

pub use service::SelectionService;
pub use state::SelectionState;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// How a selection request combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionType {
    /// Replace the selection with a single node.
    #[default]
    Default,
    /// Flip one node in or out of the selection.
    Toggle,
    /// Select every visible node between the anchor and the node.
    Range,
}

/// A selection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSelection {
    pub node: NodeId,
    pub kind: SelectionType,
}

impl TreeSelection {
    /// Creates a selection request for `node`.
    pub fn new(node: impl Into<NodeId>, kind: SelectionType) -> Self {
        Self {
            node: node.into(),
            kind,
        }
    }
}

/// One entry of the selection stack.
///
/// `focus` is the entry's anchor: the node itself for toggles, the fixed
/// end of the range for ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusableSelection {
    pub node: NodeId,
    #[serde(rename = "type")]
    pub kind: SelectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<NodeId>,
}

impl FocusableSelection {
    /// Creates a stack entry.
    pub fn new(node: impl Into<NodeId>, kind: SelectionType, focus: Option<NodeId>) -> Self {
        Self {
            node: node.into(),
            kind,
            focus,
        }
    }

    pub(crate) fn toggle(node: NodeId) -> Self {
        Self {
            focus: Some(node.clone()),
            node,
            kind: SelectionType::Toggle,
        }
    }
}
