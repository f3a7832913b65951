//! Node descriptors handed to the store by the tree's collaborator.

use super::NodeId;

/// Description of a node as supplied by the root assignment or a child
/// resolver.
///
/// A descriptor only states what the node *is*: its id, payload, visibility
/// and capabilities. Mutable view state (selection, expansion, busy count) is
/// owned by the store. When a refresh returns a descriptor whose id and
/// capabilities match an existing child, the existing node is kept and only
/// its payload and visibility are updated.
///
/// # Example
///
/// ```
/// use treekit::NodeDescriptor;
///
/// let src = NodeDescriptor::composite("src", "src/")
///     .selectable()
///     .expandable(false)
///     .with_children(vec![
///         NodeDescriptor::leaf("src/lib.rs", "lib.rs").selectable(),
///         NodeDescriptor::leaf("src/.hidden", ".hidden").visible(false),
///     ]);
///
/// assert!(src.is_composite());
/// assert_eq!(src.id().as_str(), "src");
/// ```
#[derive(Debug, Clone)]
pub struct NodeDescriptor<T = ()> {
    pub(crate) id: NodeId,
    pub(crate) data: T,
    pub(crate) visible: Option<bool>,
    pub(crate) selectable: bool,
    pub(crate) expanded: Option<bool>,
    pub(crate) children: Option<Vec<NodeDescriptor<T>>>,
}

impl<T> NodeDescriptor<T> {
    /// Describe a node that cannot hold children.
    pub fn leaf(id: impl Into<NodeId>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
            visible: None,
            selectable: false,
            expanded: None,
            children: None,
        }
    }

    /// Describe a node that holds children.
    ///
    /// The children are resolved lazily on refresh unless they are supplied
    /// up front with [`with_children`](Self::with_children).
    pub fn composite(id: impl Into<NodeId>, data: T) -> Self {
        Self {
            children: Some(Vec::new()),
            ..Self::leaf(id, data)
        }
    }

    /// Give the node the selectable capability.
    pub fn selectable(mut self) -> Self {
        self.selectable = true;
        self
    }

    /// Give the node the expandable capability with the given initial state.
    pub fn expandable(mut self, expanded: bool) -> Self {
        self.expanded = Some(expanded);
        self
    }

    /// Set explicit visibility. Nodes without an explicit value are visible.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Supply pre-resolved children. Makes the node composite.
    pub fn with_children(mut self, children: Vec<NodeDescriptor<T>>) -> Self {
        self.children = Some(children);
        self
    }

    /// The id the node will be stored under.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The payload carried by the node.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Whether the node will hold children.
    pub fn is_composite(&self) -> bool {
        self.children.is_some()
    }

    pub(crate) fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub(crate) fn is_expandable(&self) -> bool {
        self.expanded.is_some()
    }
}
