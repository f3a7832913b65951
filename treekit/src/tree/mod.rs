//! The node store handle.
//!
//! [`Tree`] owns the node graph of one tree instance. It resolves children
//! through a [`ChildResolver`], keeps the id index current, and raises the
//! structural events the rest of the model listens to.

mod busy;
mod config;
mod refresh;
mod resolver;
mod store;

pub use config::*;
pub use resolver::*;
pub use store::NodeStore;

use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{ResolveError, TreeError};
use crate::event::{Emitter, NodeRefreshed};
use crate::node::{NodeData, NodeDescriptor, NodeId, NodeRef, TreeNode};

use refresh::PendingRefresh;

// =============================================================================
// Tree
// =============================================================================

pub(crate) struct TreeInner<T: NodeData> {
    store: RwLock<NodeStore<T>>,
    resolver: Option<Arc<dyn ChildResolver<T>>>,
    config: TreeConfig,
    pending: DashMap<NodeId, PendingRefresh<T>>,
    tickets: AtomicU64,
    /// Cancelled whenever the root is replaced.
    scope: Mutex<CancellationToken>,
    on_changed: Emitter<()>,
    on_node_refreshed: Emitter<NodeRefreshed<T>>,
    on_did_change_busy: Emitter<TreeNode<T>>,
}

impl<T: NodeData> Drop for TreeInner<T> {
    fn drop(&mut self) {
        self.scope
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}

/// Handle to a tree's node store.
///
/// Cloning is cheap and yields a handle to the same tree.
///
/// # Example
///
/// ```ignore
/// use treekit::{NodeDescriptor, Tree};
///
/// let tree = Tree::builder()
///     .resolver_fn(|parent| async move { list_children(parent.id()).await })
///     .build();
///
/// tree.set_root(Some(NodeDescriptor::composite("/", ()).expandable(true))).await?;
/// let node = tree.get_node("/src");
/// ```
pub struct Tree<T: NodeData = ()> {
    inner: Arc<TreeInner<T>>,
}

impl<T: NodeData> Clone for Tree<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: NodeData + std::fmt::Debug> std::fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root())
            .field("nodes", &self.read(|store| store.len()))
            .field("pending_refreshes", &self.inner.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T: NodeData> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NodeData> Tree<T> {
    /// Create an empty tree without a child resolver.
    ///
    /// Refreshing such a tree re-applies the children already present, which
    /// suits trees whose structure is fully supplied up front.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a tree.
    pub fn builder() -> TreeBuilder<T> {
        TreeBuilder::new()
    }

    /// Create an empty tree that resolves children with `resolver`.
    pub fn with_resolver(resolver: impl ChildResolver<T> + 'static) -> Self {
        Self::builder().resolver(resolver).build()
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// The current root.
    pub fn root(&self) -> Option<TreeNode<T>> {
        self.read(|store| {
            store
                .root_id()
                .and_then(|id| store.snapshot(id.as_str()))
        })
    }

    /// Look up a node by id.
    pub fn get_node(&self, id: &str) -> Option<TreeNode<T>> {
        self.read(|store| store.snapshot(id))
    }

    /// Return the current snapshot of `node` if it is still the node stored
    /// under its id, `None` if it was removed or replaced.
    pub fn validate_node(&self, node: &TreeNode<T>) -> Option<TreeNode<T>> {
        self.read(|store| {
            store
                .validate(node)
                .and_then(|current| store.snapshot(current.id.as_str()))
        })
    }

    /// Whether the node a reference was taken from still exists, indexed
    /// under the current root or not.
    pub fn is_live(&self, node: &NodeRef) -> bool {
        self.read(|store| store.resolve(node).is_some())
    }

    /// Run `f` with shared access to the store.
    ///
    /// The store is locked for the duration of `f`, so `f` must not call
    /// back into the tree.
    pub fn read<R>(&self, f: impl FnOnce(&NodeStore<T>) -> R) -> R {
        let store = self
            .inner
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut NodeStore<T>) -> R) -> R {
        let mut store = self
            .inner
            .store
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    // -------------------------------------------------------------------------
    // Root
    // -------------------------------------------------------------------------

    /// Replace the whole tree and refresh the new root.
    ///
    /// Every node handed out before becomes stale, pending busy markers of
    /// the previous tree are dropped, and in-flight refreshes are detached
    /// from the new tree.
    pub async fn set_root(
        &self,
        root: Option<NodeDescriptor<T>>,
    ) -> Result<Option<TreeNode<T>>, TreeError> {
        self.replace_root(root);
        match self.root() {
            Some(root) if root.is_composite() => self.refresh(Some(&root)).await,
            root => Ok(root),
        }
    }

    fn replace_root(&self, root: Option<NodeDescriptor<T>>) {
        let previous = {
            let mut scope = self
                .inner
                .scope
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *scope, CancellationToken::new())
        };
        previous.cancel();
        self.inner.pending.clear();

        let id = root.as_ref().map(|root| root.id().clone());
        self.update(|store| store.reset(root));
        match id {
            Some(id) => log::debug!("tree root replaced with `{id}`"),
            None => log::debug!("tree root cleared"),
        }
        self.fire_changed();
    }

    /// Make an existing node the root without rebuilding it.
    ///
    /// Nodes outside the new root's subtree stay alive so the previous root
    /// can be restored later.
    pub(crate) fn navigate_root(&self, node: &NodeRef) -> bool {
        let moved = self.update(|store| store.reroot(node));
        if moved {
            log::debug!("tree rerooted at `{}`", node.id());
            self.fire_changed();
        }
        moved
    }

    pub(crate) fn root_ref(&self) -> Option<NodeRef> {
        self.read(|store| store.root().map(TreeNode::node_ref))
    }

    pub(crate) fn scope(&self) -> CancellationToken {
        self.inner
            .scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Fired after structural changes: root replacement, navigation and
    /// every completed refresh, successful or not.
    pub fn on_changed(&self) -> &Emitter<()> {
        &self.inner.on_changed
    }

    /// Fired once per completed refresh, after the children were swapped in
    /// and before the refresh resolves.
    pub fn on_node_refreshed(&self) -> &Emitter<NodeRefreshed<T>> {
        &self.inner.on_node_refreshed
    }

    /// Fired whenever a node's busy count changes.
    pub fn on_did_change_busy(&self) -> &Emitter<TreeNode<T>> {
        &self.inner.on_did_change_busy
    }

    pub(crate) fn fire_changed(&self) {
        self.inner.on_changed.fire(&());
    }

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------

    /// The tree's configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.inner.config
    }

    /// Create a handle that does not keep the tree alive.
    pub fn downgrade(&self) -> WeakTree<T> {
        WeakTree {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Tree`], used by listeners and timers that must
/// not keep the tree alive.
pub struct WeakTree<T: NodeData> {
    inner: Weak<TreeInner<T>>,
}

impl<T: NodeData> WeakTree<T> {
    /// Get a strong handle if the tree still exists.
    pub fn upgrade(&self) -> Option<Tree<T>> {
        self.inner.upgrade().map(|inner| Tree { inner })
    }
}

impl<T: NodeData> Clone for WeakTree<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: NodeData> std::fmt::Debug for WeakTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakTree")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Tree`].
pub struct TreeBuilder<T: NodeData> {
    resolver: Option<Arc<dyn ChildResolver<T>>>,
    config: TreeConfig,
}

impl<T: NodeData> TreeBuilder<T> {
    fn new() -> Self {
        Self {
            resolver: None,
            config: TreeConfig::default(),
        }
    }

    /// Resolve children with `resolver`.
    pub fn resolver(mut self, resolver: impl ChildResolver<T> + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Resolve children with an async closure.
    pub fn resolver_fn<F, Fut>(self, resolve: F) -> Self
    where
        F: Fn(TreeNode<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<NodeDescriptor<T>>, ResolveError>> + Send + 'static,
    {
        self.resolver(FnResolver::new(resolve))
    }

    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates the tree. It starts without a root.
    pub fn build(self) -> Tree<T> {
        Tree {
            inner: Arc::new(TreeInner {
                store: RwLock::new(NodeStore::new()),
                resolver: self.resolver,
                config: self.config,
                pending: DashMap::new(),
                tickets: AtomicU64::new(0),
                scope: Mutex::new(CancellationToken::new()),
                on_changed: Emitter::new(),
                on_node_refreshed: Emitter::new(),
                on_did_change_busy: Emitter::new(),
            }),
        }
    }
}

impl<T: NodeData> std::fmt::Debug for TreeBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("resolver", &self.resolver.is_some())
            .field("config", &self.config)
            .finish()
    }
}
