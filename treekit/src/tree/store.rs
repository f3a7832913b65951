//! Node arena and id index.

use std::collections::{HashMap, HashSet};

use crate::node::{NodeData, NodeDescriptor, NodeId, NodeRef, TreeNode};

/// Owns every node of a tree and the id index over the current root.
///
/// Forward edges (`children`) are the only ownership relation. Parent and
/// sibling ids are derived links, recomputed whenever a child list changes.
///
/// The arena may hold nodes that are not reachable from the current root:
/// after navigating into a subtree, the former ancestors stay alive so that
/// navigation history can return to them. Only nodes reachable from the
/// current root are *indexed*, and every public lookup goes through the index.
#[derive(Debug)]
pub struct NodeStore<T> {
    root: Option<NodeId>,
    nodes: HashMap<NodeId, TreeNode<T>>,
    index: HashSet<NodeId>,
}

impl<T: NodeData> NodeStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            root: None,
            nodes: HashMap::new(),
            index: HashSet::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// The current root.
    pub fn root(&self) -> Option<&TreeNode<T>> {
        self.root.as_ref().and_then(|id| self.nodes.get(id))
    }

    /// Id of the current root.
    pub fn root_id(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    /// Look up an indexed node.
    pub fn get(&self, id: &str) -> Option<&TreeNode<T>> {
        if self.index.contains(id) {
            self.nodes.get(id)
        } else {
            None
        }
    }

    /// Whether a node with this id is reachable from the root.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the tree has no root.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Return the indexed node if `node` still refers to it.
    pub fn validate(&self, node: &TreeNode<T>) -> Option<&TreeNode<T>> {
        self.get(node.id.as_str())
            .filter(|current| current.stamp == node.stamp)
    }

    /// Look up the indexed node a reference points to.
    pub(crate) fn validate_ref(&self, node: &NodeRef) -> Option<&TreeNode<T>> {
        self.get(node.id.as_str())
            .filter(|current| current.stamp == node.stamp)
    }

    /// Resolve a reference against the arena, indexed or not.
    pub(crate) fn resolve(&self, node: &NodeRef) -> Option<&TreeNode<T>> {
        self.nodes
            .get(&node.id)
            .filter(|current| current.stamp == node.stamp)
    }

    /// Owned snapshot of an indexed node. The root is reported without
    /// parent or siblings.
    pub fn snapshot(&self, id: &str) -> Option<TreeNode<T>> {
        self.get(id).map(|node| self.detach_root_links(node.clone()))
    }

    pub(crate) fn snapshot_ref(&self, node: &NodeRef) -> Option<TreeNode<T>> {
        self.resolve(node)
            .map(|node| self.detach_root_links(node.clone()))
    }

    fn detach_root_links(&self, mut node: TreeNode<T>) -> TreeNode<T> {
        if self.root.as_ref() == Some(&node.id) {
            node.parent = None;
            node.previous_sibling = None;
            node.next_sibling = None;
        }
        node
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Parent of an indexed node. `None` for the root.
    pub fn parent(&self, id: &str) -> Option<&TreeNode<T>> {
        if self.root.as_ref().is_some_and(|root| root == id) {
            return None;
        }
        let parent = self.get(id)?.parent.as_ref()?;
        self.get(parent.as_str())
    }

    /// Children of an indexed node, in order.
    pub fn children(&self, id: &str) -> impl Iterator<Item = &TreeNode<T>> {
        self.get(id)
            .map(TreeNode::children)
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.nodes.get(child))
    }

    /// First child of a composite.
    pub fn first_child(&self, id: &str) -> Option<&TreeNode<T>> {
        self.children(id).next()
    }

    /// Last child of a composite.
    pub fn last_child(&self, id: &str) -> Option<&TreeNode<T>> {
        self.children(id).last()
    }

    /// Next sibling of an indexed node. The root has no siblings.
    pub fn next_sibling(&self, id: &str) -> Option<&TreeNode<T>> {
        if self.is_root(id) {
            return None;
        }
        let sibling = self.get(id)?.next_sibling.as_ref()?;
        self.get(sibling.as_str())
    }

    /// Previous sibling of an indexed node. The root has no siblings.
    pub fn previous_sibling(&self, id: &str) -> Option<&TreeNode<T>> {
        if self.is_root(id) {
            return None;
        }
        let sibling = self.get(id)?.previous_sibling.as_ref()?;
        self.get(sibling.as_str())
    }

    /// Position of `child` among the children of `parent`.
    pub fn index_of(&self, parent: &str, child: &str) -> Option<usize> {
        self.get(parent)?
            .children()
            .iter()
            .position(|id| id == child)
    }

    /// Whether `ancestor` is a proper ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent.id == ancestor {
                return true;
            }
            current = self.parent(parent.id.as_str());
        }
        false
    }

    /// Distance from the root. The root has depth 0.
    pub fn depth(&self, id: &str) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.get(id)?;
        while let Some(parent) = self.parent(current.id.as_str()) {
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    pub(crate) fn is_root(&self, id: &str) -> bool {
        self.root.as_ref().is_some_and(|root| root == id)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Mutable access to an indexed node.
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut TreeNode<T>> {
        if self.index.contains(id) {
            self.nodes.get_mut(id)
        } else {
            None
        }
    }

    /// Mutable access to the node a reference points to.
    pub(crate) fn resolve_mut(&mut self, node: &NodeRef) -> Option<&mut TreeNode<T>> {
        self.nodes
            .get_mut(&node.id)
            .filter(|current| current.stamp == node.stamp)
    }

    /// Replace the whole tree. Every previously handed out node becomes stale.
    pub(crate) fn reset(&mut self, root: Option<NodeDescriptor<T>>) {
        self.nodes.clear();
        self.index.clear();
        self.root = root.and_then(|descriptor| self.insert(descriptor, None, true));
    }

    /// Make an existing node the root and rebuild the index from it.
    pub(crate) fn reroot(&mut self, node: &NodeRef) -> bool {
        if self.resolve(node).is_none() {
            return false;
        }
        self.root = Some(node.id.clone());
        self.rebuild_index();
        true
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        let mut stack: Vec<NodeId> = self.root.iter().cloned().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children().iter().cloned());
                self.index.insert(id);
            }
        }
    }

    /// Replace the children of a composite.
    ///
    /// Children whose id and capabilities match an existing child keep their
    /// node (and with it selection, expansion, busy state and subtree); only
    /// payload and visibility are taken from the descriptor. Pre-resolved
    /// grandchildren of a kept composite are merged recursively when the
    /// descriptor supplies any. Children that disappeared are removed with
    /// their subtree.
    ///
    /// `None` re-applies the current children unchanged. Returns `None` when
    /// the parent no longer exists or is not composite.
    pub(crate) fn apply_children(
        &mut self,
        parent: &NodeRef,
        children: Option<Vec<NodeDescriptor<T>>>,
    ) -> Option<TreeNode<T>> {
        let old = self.resolve(parent)?.children.clone()?;
        if let Some(children) = children {
            self.replace_children(&parent.id, old, children);
        } else {
            self.relink(&parent.id);
        }
        self.snapshot_ref(parent)
    }

    fn replace_children(
        &mut self,
        parent: &NodeId,
        old: Vec<NodeId>,
        children: Vec<NodeDescriptor<T>>,
    ) {
        let indexed = self.index.contains(parent);
        let incoming: HashSet<&NodeId> = children.iter().map(|child| &child.id).collect();
        let removed: Vec<NodeId> = old
            .iter()
            .filter(|id| !incoming.contains(id))
            .cloned()
            .collect();
        for id in &removed {
            self.remove_subtree(id);
        }

        let mut ids = Vec::with_capacity(children.len());
        let mut seen = HashSet::with_capacity(children.len());
        for descriptor in children {
            if !seen.insert(descriptor.id.clone()) {
                log::warn!(
                    "dropping duplicate child `{}` of `{}`",
                    descriptor.id,
                    parent
                );
                continue;
            }
            let existing = old.contains(&descriptor.id);
            let kept = existing
                && self
                    .nodes
                    .get(&descriptor.id)
                    .is_some_and(|node| node.same_capabilities(&descriptor));
            if kept {
                ids.push(self.update_kept(descriptor));
                continue;
            }
            if existing {
                self.remove_subtree(&descriptor.id);
            }
            ids.extend(self.insert(descriptor, Some(parent.clone()), indexed));
        }

        if let Some(node) = self.nodes.get_mut(parent) {
            node.children = Some(ids);
        }
        self.relink(parent);
    }

    fn update_kept(&mut self, descriptor: NodeDescriptor<T>) -> NodeId {
        let NodeDescriptor {
            id,
            data,
            visible,
            children,
            ..
        } = descriptor;
        let node_ref = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.data = data;
                node.visible = visible;
                node.node_ref()
            }
            None => return id,
        };
        if let Some(children) = children.filter(|children| !children.is_empty()) {
            self.apply_children(&node_ref, Some(children));
        }
        id
    }

    /// Insert a descriptor and its pre-resolved children.
    ///
    /// A node with the same id elsewhere in the arena is moved here. A
    /// descriptor reusing the id of `parent` or one of its ancestors is
    /// dropped, since inserting it would cut the tree above itself.
    fn insert(
        &mut self,
        descriptor: NodeDescriptor<T>,
        parent: Option<NodeId>,
        indexed: bool,
    ) -> Option<NodeId> {
        if let Some(parent) = &parent
            && self.is_on_path(&descriptor.id, parent)
        {
            log::warn!(
                "dropping child `{}` of `{}`: the id belongs to the parent or one of its ancestors",
                descriptor.id,
                parent
            );
            return None;
        }
        if self.nodes.contains_key(&descriptor.id) {
            log::warn!(
                "node `{}` already exists elsewhere in the tree, replacing it",
                descriptor.id
            );
            self.detach(&descriptor.id.clone());
        }

        let mut descriptor = descriptor;
        let children = descriptor.children.take();
        let id = descriptor.id.clone();
        let mut node = TreeNode::from_descriptor(descriptor, parent);
        let composite = children.is_some();
        node.children = children.as_ref().map(|_| Vec::new());
        self.nodes.insert(id.clone(), node);
        if indexed {
            self.index.insert(id.clone());
        }

        if let Some(children) = children {
            let mut ids = Vec::with_capacity(children.len());
            for child in children {
                if ids.contains(&child.id) {
                    log::warn!("dropping duplicate child `{}` of `{}`", child.id, id);
                    continue;
                }
                ids.extend(self.insert(child, Some(id.clone()), indexed));
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = Some(ids);
            }
        }
        if composite {
            self.relink(&id);
        }
        Some(id)
    }

    /// Whether `id` names `parent` or one of its ancestors. Walks the arena
    /// rather than the index so ancestors above a navigated root count too.
    fn is_on_path(&self, id: &NodeId, parent: &NodeId) -> bool {
        let mut current = Some(parent);
        while let Some(ancestor) = current {
            if ancestor == id {
                return true;
            }
            current = self.nodes.get(ancestor).and_then(|node| node.parent.as_ref());
        }
        false
    }

    /// Remove a node with its subtree and unlink it from its parent.
    fn detach(&mut self, id: &NodeId) {
        let parent = self.nodes.get(id).and_then(|node| node.parent.clone());
        self.remove_subtree(id);
        if self.root.as_ref() == Some(id) {
            self.root = None;
        }
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent)
                && let Some(children) = node.children.as_mut()
            {
                children.retain(|child| child != id);
            }
            self.relink(&parent);
        }
    }

    fn remove_subtree(&mut self, id: &NodeId) {
        let mut stack = vec![id.clone()];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                stack.extend(node.children.unwrap_or_default());
            }
            self.index.remove(&id);
        }
    }

    /// Recompute parent and sibling links of a composite's children.
    fn relink(&mut self, parent: &NodeId) {
        let children = match self.nodes.get(parent).and_then(|node| node.children.clone()) {
            Some(children) => children,
            None => return,
        };
        for (position, child) in children.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(parent.clone());
                node.previous_sibling = position
                    .checked_sub(1)
                    .map(|previous| children[previous].clone());
                node.next_sibling = children.get(position + 1).cloned();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NodeStore<&'static str> {
        let mut store = NodeStore::new();
        store.reset(Some(
            NodeDescriptor::composite("root", "root").with_children(vec![
                NodeDescriptor::composite("a", "a")
                    .expandable(true)
                    .with_children(vec![
                        NodeDescriptor::leaf("a1", "a1").selectable(),
                        NodeDescriptor::leaf("a2", "a2").selectable(),
                    ]),
                NodeDescriptor::leaf("b", "b").selectable(),
            ]),
        ));
        store
    }

    #[test]
    fn test_reset_indexes_every_reachable_node() {
        let store = store();
        assert_eq!(store.len(), 5);
        assert_eq!(store.root_id().map(NodeId::as_str), Some("root"));
        for id in ["root", "a", "a1", "a2", "b"] {
            assert!(store.contains(id), "{id} should be indexed");
        }
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_links_are_derived_from_child_order() {
        let store = store();
        assert_eq!(store.parent("a1").map(|n| n.id.as_str()), Some("a"));
        assert_eq!(store.next_sibling("a1").map(|n| n.id.as_str()), Some("a2"));
        assert_eq!(store.previous_sibling("a2").map(|n| n.id.as_str()), Some("a1"));
        assert!(store.next_sibling("a2").is_none());
        assert!(store.parent("root").is_none());
        assert_eq!(store.index_of("root", "b"), Some(1));
        assert_eq!(store.first_child("a").map(|n| n.id.as_str()), Some("a1"));
        assert_eq!(store.last_child("a").map(|n| n.id.as_str()), Some("a2"));
        assert_eq!(store.depth("a2"), Some(2));
        assert!(store.is_ancestor("root", "a2"));
        assert!(!store.is_ancestor("b", "a2"));
    }

    #[test]
    fn test_apply_children_keeps_matching_nodes() {
        let mut store = store();
        store.get_mut("a1").unwrap().selected = Some(true);
        let a1_before = store.get("a1").unwrap().clone();
        let parent = store.get("a").unwrap().node_ref();

        store.apply_children(
            &parent,
            Some(vec![
                NodeDescriptor::leaf("a0", "a0").selectable(),
                NodeDescriptor::leaf("a1", "renamed").selectable(),
            ]),
        );

        let a1 = store.get("a1").unwrap();
        assert!(a1.same_node(&a1_before));
        assert!(a1.is_selected());
        assert_eq!(*a1.data(), "renamed");
        assert!(store.get("a2").is_none());
        assert_eq!(store.previous_sibling("a1").map(|n| n.id.as_str()), Some("a0"));
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_apply_children_replaces_node_with_new_capabilities() {
        let mut store = store();
        let before = store.get("b").unwrap().clone();
        let root = store.root().unwrap().node_ref();

        store.apply_children(
            &root,
            Some(vec![NodeDescriptor::composite("b", "b").selectable()]),
        );

        let after = store.get("b").unwrap();
        assert!(after.is_composite());
        assert!(!after.same_node(&before));
        assert!(store.get("a").is_none());
        assert!(store.get("a1").is_none());
    }

    #[test]
    fn test_apply_children_drops_duplicates() {
        let mut store = store();
        let root = store.root().unwrap().node_ref();
        store.apply_children(
            &root,
            Some(vec![
                NodeDescriptor::leaf("x", "first"),
                NodeDescriptor::leaf("x", "second"),
            ]),
        );
        assert_eq!(store.root().unwrap().children().len(), 1);
        assert_eq!(*store.get("x").unwrap().data(), "first");
    }

    #[test]
    fn test_apply_children_moves_node_from_other_parent() {
        let mut store = store();
        let a = store.get("a").unwrap().node_ref();

        store.apply_children(
            &a,
            Some(vec![
                NodeDescriptor::leaf("a1", "a1").selectable(),
                NodeDescriptor::leaf("b", "moved").selectable(),
            ]),
        );

        assert_eq!(store.root().unwrap().children(), ["a"]);
        assert_eq!(store.parent("b").map(|n| n.id.as_str()), Some("a"));
        assert_eq!(store.previous_sibling("b").map(|n| n.id.as_str()), Some("a1"));
        assert_eq!(*store.get("b").unwrap().data(), "moved");
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_apply_children_drops_child_named_like_parent() {
        let mut store = store();
        let before = store.get("a").unwrap().clone();

        store.apply_children(
            &before.node_ref(),
            Some(vec![NodeDescriptor::leaf("a", "a")]),
        );

        let a = store.get("a").unwrap();
        assert!(a.same_node(&before));
        assert!(a.children().is_empty());
        assert_eq!(store.parent("a").map(|n| n.id.as_str()), Some("root"));
        assert_eq!(store.root().unwrap().children(), ["a", "b"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_apply_children_drops_child_named_like_ancestor() {
        let mut store = store();
        let a = store.get("a").unwrap().node_ref();

        store.apply_children(
            &a,
            Some(vec![
                NodeDescriptor::composite("root", "root"),
                NodeDescriptor::leaf("a1", "a1").selectable(),
            ]),
        );

        assert_eq!(store.root_id().map(NodeId::as_str), Some("root"));
        assert_eq!(store.root().unwrap().children(), ["a", "b"]);
        assert_eq!(store.get("a").unwrap().children(), ["a1"]);
        assert_eq!(store.depth("a1"), Some(2));
        assert_eq!(store.len(), 4);

        // Pre-resolved grandchildren are checked against the new chain too.
        let root = store.root().unwrap().node_ref();
        store.apply_children(
            &root,
            Some(vec![
                NodeDescriptor::composite("c", "c")
                    .with_children(vec![NodeDescriptor::leaf("c", "c")]),
            ]),
        );
        assert!(store.get("c").unwrap().children().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_apply_children_drops_ancestor_above_navigated_root() {
        let mut store = store();
        let a = store.get("a").unwrap().node_ref();
        let old_root = store.root().unwrap().node_ref();
        store.reroot(&a);

        store.apply_children(&a, Some(vec![NodeDescriptor::leaf("root", "root")]));

        assert!(store.resolve(&old_root).is_some());
        assert!(store.reroot(&old_root));
        assert_eq!(store.parent("a").map(|n| n.id.as_str()), Some("root"));
    }

    #[test]
    fn test_apply_children_on_stale_parent_is_ignored() {
        let mut store = store();
        let stale = store.get("a").unwrap().node_ref();
        store.reset(Some(NodeDescriptor::composite("root", "root")));

        assert!(store.apply_children(&stale, Some(Vec::new())).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_validate_rejects_reinserted_node() {
        let mut store = store();
        let old = store.get("b").unwrap().clone();
        let root = store.root().unwrap().node_ref();
        store.apply_children(&root, Some(Vec::new()));
        store.apply_children(&root, Some(vec![NodeDescriptor::leaf("b", "b").selectable()]));

        assert!(store.get("b").is_some());
        assert!(store.validate(&old).is_none());
    }

    #[test]
    fn test_reroot_keeps_former_ancestors_in_arena() {
        let mut store = store();
        let old_root = store.root().unwrap().node_ref();
        let a = store.get("a").unwrap().node_ref();

        assert!(store.reroot(&a));
        assert_eq!(store.len(), 3);
        assert!(store.get("b").is_none());
        assert!(store.snapshot("a").unwrap().parent().is_none());
        assert!(store.resolve(&old_root).is_some());

        assert!(store.reroot(&old_root));
        assert_eq!(store.len(), 5);
        assert_eq!(store.parent("a").map(|n| n.id.as_str()), Some("root"));
    }
}
