//! Tree nodes.
//!
//! Nodes are stored in the tree's [`NodeStore`](crate::NodeStore) and handed
//! out as [`TreeNode`] snapshots. A snapshot carries the node's structural
//! links as ids, its capabilities, and the view state the store is allowed
//! to mutate (selection, expansion, busy count).

mod descriptor;
mod id;

pub use descriptor::NodeDescriptor;
pub use id::NodeId;

use std::sync::atomic::{AtomicU64, Ordering};

/// Bound for payload data carried by nodes.
pub trait NodeData: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> NodeData for T {}

/// The closed set of capabilities a node may have.
///
/// Capabilities are independent: a node may have none, one, or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The node holds an ordered list of children.
    Composite,
    /// The node can be part of the selection.
    Selectable,
    /// The node can be expanded and collapsed.
    Expandable,
}

/// Snapshot of a node in the tree.
///
/// Two snapshots describe the same node when [`same_node`](Self::same_node)
/// holds: equal id and equal insertion stamp. A node that was removed and
/// re-inserted under the same id is a different node.
#[derive(Debug, Clone)]
pub struct TreeNode<T = ()> {
    pub(crate) id: NodeId,
    pub(crate) stamp: u64,
    pub(crate) data: T,
    pub(crate) parent: Option<NodeId>,
    pub(crate) previous_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) visible: Option<bool>,
    pub(crate) selected: Option<bool>,
    pub(crate) expanded: Option<bool>,
    pub(crate) busy: u32,
}

impl<T> TreeNode<T> {
    pub(crate) fn from_descriptor(descriptor: NodeDescriptor<T>, parent: Option<NodeId>) -> Self {
        static STAMP: AtomicU64 = AtomicU64::new(1);
        Self {
            id: descriptor.id,
            stamp: STAMP.fetch_add(1, Ordering::Relaxed),
            data: descriptor.data,
            parent,
            previous_sibling: None,
            next_sibling: None,
            children: descriptor.children.map(|_| Vec::new()),
            visible: descriptor.visible,
            selected: descriptor.selectable.then_some(false),
            expanded: descriptor.expanded,
            busy: 0,
        }
    }

    /// The node's id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The payload supplied by the collaborator.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Parent id. `None` for the root.
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Previous sibling id in the parent's child order.
    pub fn previous_sibling(&self) -> Option<&NodeId> {
        self.previous_sibling.as_ref()
    }

    /// Next sibling id in the parent's child order.
    pub fn next_sibling(&self) -> Option<&NodeId> {
        self.next_sibling.as_ref()
    }

    /// Child ids in order. Empty for nodes that are not composite.
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Explicit visibility, `None` meaning visible.
    pub fn visible(&self) -> Option<bool> {
        self.visible
    }

    /// Whether the node should be rendered. Only an explicit `false` hides it.
    pub fn is_visible(&self) -> bool {
        self.visible != Some(false)
    }

    /// Number of outstanding busy markers that have activated.
    pub fn busy(&self) -> u32 {
        self.busy
    }

    /// Whether at least one busy marker is active.
    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    /// Check a capability.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Composite => self.children.is_some(),
            Capability::Selectable => self.selected.is_some(),
            Capability::Expandable => self.expanded.is_some(),
        }
    }

    /// Whether the node holds children.
    pub fn is_composite(&self) -> bool {
        self.has(Capability::Composite)
    }

    /// Whether the node can be selected.
    pub fn is_selectable(&self) -> bool {
        self.has(Capability::Selectable)
    }

    /// Whether the node is selectable and currently selected.
    pub fn is_selected(&self) -> bool {
        self.selected == Some(true)
    }

    /// Whether the node can be expanded.
    pub fn is_expandable(&self) -> bool {
        self.has(Capability::Expandable)
    }

    /// Whether the node is expandable and expanded.
    pub fn is_expanded(&self) -> bool {
        self.expanded == Some(true)
    }

    /// Whether the node is expandable and collapsed.
    pub fn is_collapsed(&self) -> bool {
        self.expanded == Some(false)
    }

    /// Whether both snapshots describe the same stored node.
    pub fn same_node(&self, other: &TreeNode<T>) -> bool {
        self.id == other.id && self.stamp == other.stamp
    }

    pub(crate) fn same_capabilities(&self, descriptor: &NodeDescriptor<T>) -> bool {
        self.is_composite() == descriptor.is_composite()
            && self.is_selectable() == descriptor.is_selectable()
            && self.is_expandable() == descriptor.is_expandable()
    }

    pub(crate) fn node_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id.clone(),
            stamp: self.stamp,
        }
    }
}

/// A reference to one particular stored node.
///
/// Unlike a bare [`NodeId`], a `NodeRef` stops resolving once the node it was
/// taken from has been removed, even if another node later takes the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub(crate) id: NodeId,
    pub(crate) stamp: u64,
}

impl NodeRef {
    /// The referenced node's id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }
}

impl<T> From<&TreeNode<T>> for NodeRef {
    fn from(node: &TreeNode<T>) -> Self {
        node.node_ref()
    }
}
