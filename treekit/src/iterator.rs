//! Depth-first traversal over the nodes under the current root.
//!
//! Iteration is lazy and borrows the store, so it holds no resources and
//! can be dropped at any point. An iterator can be cloned or restarted to
//! walk the same sequence again.

use crate::node::{NodeData, TreeNode};
use crate::tree::NodeStore;

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Pre-order: a node, then its children, then its next sibling.
    #[default]
    Forward,
    /// The exact reverse of [`Forward`](Self::Forward).
    Backward,
}

/// Options controlling which nodes a [`TreeIterator`] visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterOptions {
    pub direction: Direction,
    /// Do not descend into collapsed composites. Collapsed composites are
    /// still yielded themselves.
    pub prune_collapsed: bool,
    /// Skip invisible nodes together with their subtrees.
    pub prune_invisible: bool,
    /// Yield the start node first.
    pub include_start: bool,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            prune_collapsed: true,
            prune_invisible: true,
            include_start: true,
        }
    }
}

impl IterOptions {
    /// Forward traversal of visible, expanded nodes.
    pub fn forward() -> Self {
        Self::default()
    }

    /// Backward traversal of visible, expanded nodes.
    pub fn backward() -> Self {
        Self {
            direction: Direction::Backward,
            ..Self::default()
        }
    }

    /// Sets whether children of collapsed nodes are skipped.
    pub fn with_prune_collapsed(mut self, prune: bool) -> Self {
        self.prune_collapsed = prune;
        self
    }

    /// Sets whether invisible nodes and their subtrees are skipped.
    pub fn with_prune_invisible(mut self, prune: bool) -> Self {
        self.prune_invisible = prune;
        self
    }

    /// Sets whether the start node itself is yielded.
    pub fn with_include_start(mut self, include: bool) -> Self {
        self.include_start = include;
        self
    }
}

/// Lazy depth-first iterator over a [`NodeStore`].
///
/// Forward iteration visits nodes in pre-order and ends after the last node
/// under the root. Backward iteration visits them in reverse and ends at the
/// root.
///
/// # Example
///
/// ```ignore
/// let visible: Vec<_> = tree.read(|store| {
///     store
///         .iter("root", IterOptions::forward())
///         .map(|node| node.id().clone())
///         .collect()
/// });
/// ```
pub struct TreeIterator<'a, T> {
    store: &'a NodeStore<T>,
    start: Option<&'a TreeNode<T>>,
    next: Option<&'a TreeNode<T>>,
    options: IterOptions,
}

impl<'a, T: NodeData> TreeIterator<'a, T> {
    /// Iterate from `start`. An unknown start yields nothing.
    pub fn new(store: &'a NodeStore<T>, start: &str, options: IterOptions) -> Self {
        let mut iter = Self {
            store,
            start: store.get(start),
            next: None,
            options,
        };
        iter.restart();
        iter
    }

    /// Rewind to the start node.
    pub fn restart(&mut self) {
        self.next = match self.start {
            Some(start) if self.options.include_start => Some(start),
            Some(start) => self.step(start),
            None => None,
        };
    }

    pub fn options(&self) -> IterOptions {
        self.options
    }

    fn step(&self, node: &'a TreeNode<T>) -> Option<&'a TreeNode<T>> {
        match self.options.direction {
            Direction::Forward => self.successor(node),
            Direction::Backward => self.predecessor(node),
        }
    }

    fn eligible(&self, node: &TreeNode<T>) -> bool {
        !self.options.prune_invisible || node.is_visible()
    }

    fn descends(&self, node: &TreeNode<T>) -> bool {
        node.is_composite()
            && (!self.options.prune_collapsed || !node.is_expandable() || node.is_expanded())
    }

    fn successor(&self, node: &'a TreeNode<T>) -> Option<&'a TreeNode<T>> {
        if self.descends(node)
            && let Some(child) = self
                .store
                .children(node.id().as_str())
                .find(|child| self.eligible(child))
        {
            return Some(child);
        }

        let mut current = node;
        loop {
            if let Some(sibling) = self.next_eligible_sibling(current) {
                return Some(sibling);
            }
            current = self.store.parent(current.id().as_str())?;
        }
    }

    fn predecessor(&self, node: &'a TreeNode<T>) -> Option<&'a TreeNode<T>> {
        match self.previous_eligible_sibling(node) {
            Some(sibling) => Some(self.deepest_last(sibling)),
            None => self.store.parent(node.id().as_str()),
        }
    }

    fn deepest_last(&self, node: &'a TreeNode<T>) -> &'a TreeNode<T> {
        let mut current = node;
        while self.descends(current) {
            let last = self
                .store
                .children(current.id().as_str())
                .filter(|child| self.eligible(child))
                .last();
            match last {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    fn next_eligible_sibling(&self, node: &TreeNode<T>) -> Option<&'a TreeNode<T>> {
        let mut sibling = self.store.next_sibling(node.id().as_str());
        while let Some(candidate) = sibling {
            if self.eligible(candidate) {
                return Some(candidate);
            }
            sibling = self.store.next_sibling(candidate.id().as_str());
        }
        None
    }

    fn previous_eligible_sibling(&self, node: &TreeNode<T>) -> Option<&'a TreeNode<T>> {
        let mut sibling = self.store.previous_sibling(node.id().as_str());
        while let Some(candidate) = sibling {
            if self.eligible(candidate) {
                return Some(candidate);
            }
            sibling = self.store.previous_sibling(candidate.id().as_str());
        }
        None
    }
}

impl<'a, T: NodeData> Iterator for TreeIterator<'a, T> {
    type Item = &'a TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.step(current);
        Some(current)
    }
}

impl<T> Clone for TreeIterator<'_, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            start: self.start,
            next: self.next,
            options: self.options,
        }
    }
}

impl<T: NodeData> NodeStore<T> {
    /// Iterate from the node with id `start`.
    pub fn iter(&self, start: &str, options: IterOptions) -> TreeIterator<'_, T> {
        TreeIterator::new(self, start, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeDescriptor;
    use crate::tree::Tree;

    /// root
    /// ├── a (collapsed)
    /// │   ├── a1
    /// │   └── a2
    /// ├── b (hidden)
    /// │   └── b1
    /// └── c (expanded)
    ///     └── c1
    async fn tree() -> Tree<()> {
        let tree = Tree::new();
        tree.set_root(Some(NodeDescriptor::composite("root", ()).with_children(vec![
            NodeDescriptor::composite("a", ())
                .expandable(false)
                .with_children(vec![
                    NodeDescriptor::leaf("a1", ()),
                    NodeDescriptor::leaf("a2", ()),
                ]),
            NodeDescriptor::composite("b", ())
                .visible(false)
                .with_children(vec![NodeDescriptor::leaf("b1", ())]),
            NodeDescriptor::composite("c", ())
                .expandable(true)
                .with_children(vec![NodeDescriptor::leaf("c1", ())]),
        ])))
        .await
        .unwrap();
        tree
    }

    fn ids(tree: &Tree<()>, start: &str, options: IterOptions) -> Vec<String> {
        tree.read(|store| {
            store
                .iter(start, options)
                .map(|node| node.id().to_string())
                .collect()
        })
    }

    #[tokio::test]
    async fn test_forward_prunes_collapsed_and_hidden() {
        let tree = tree().await;
        assert_eq!(ids(&tree, "root", IterOptions::forward()), ["root", "a", "c", "c1"]);
    }

    #[tokio::test]
    async fn test_forward_without_collapse_pruning() {
        let tree = tree().await;
        let options = IterOptions::forward().with_prune_collapsed(false);
        assert_eq!(ids(&tree, "root", options), ["root", "a", "a1", "a2", "c", "c1"]);
    }

    #[tokio::test]
    async fn test_forward_ascends_from_last_child() {
        let tree = tree().await;
        let options = IterOptions::forward()
            .with_prune_collapsed(false)
            .with_include_start(false);
        assert_eq!(ids(&tree, "a2", options), ["c", "c1"]);
    }

    #[tokio::test]
    async fn test_backward_mirrors_forward() {
        let tree = tree().await;
        assert_eq!(ids(&tree, "c1", IterOptions::backward()), ["c1", "c", "a", "root"]);

        let options = IterOptions::backward().with_prune_collapsed(false);
        let mut forward = ids(&tree, "root", IterOptions::forward().with_prune_collapsed(false));
        forward.reverse();
        assert_eq!(ids(&tree, "c1", options), forward);
    }

    #[tokio::test]
    async fn test_hidden_nodes_are_visited_without_pruning() {
        let tree = tree().await;
        let options = IterOptions::forward().with_prune_invisible(false);
        assert_eq!(ids(&tree, "root", options), ["root", "a", "b", "b1", "c", "c1"]);
    }

    #[tokio::test]
    async fn test_unknown_start_is_empty() {
        let tree = tree().await;
        assert!(ids(&tree, "missing", IterOptions::forward()).is_empty());
    }

    #[tokio::test]
    async fn test_iterator_restarts() {
        let tree = tree().await;
        tree.read(|store| {
            let mut iter = store.iter("a", IterOptions::forward());
            let first: Vec<_> = iter.clone().map(|n| n.id().clone()).collect();
            iter.next();
            iter.next();
            iter.restart();
            let second: Vec<_> = iter.map(|n| n.id().clone()).collect();
            assert_eq!(first, second);
        });
    }
}
