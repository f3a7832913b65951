//! The tree model.
//!
//! [`TreeModel`] ties a [`Tree`] together with selection, expansion, focus
//! and navigation history, and republishes their events as one surface for
//! the rendering layer.

mod state;

pub use state::*;

use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TreeError;
use crate::event::{Emitter, NodeRefreshed, Subscription};
use crate::expansion::ExpansionService;
use crate::focus::FocusService;
use crate::iterator::IterOptions;
use crate::navigation::{NavigationConfig, NavigationHistory};
use crate::node::{NodeData, NodeDescriptor, NodeId, NodeRef, TreeNode};
use crate::selection::{SelectionService, SelectionType, TreeSelection};
use crate::tree::{NodeStore, Tree};

/// A node given either as a snapshot or by id.
#[derive(Debug, Clone, Copy)]
pub enum NavigationTarget<'a, T> {
    Node(&'a TreeNode<T>),
    Id(&'a str),
}

impl<'a, T> From<&'a TreeNode<T>> for NavigationTarget<'a, T> {
    fn from(node: &'a TreeNode<T>) -> Self {
        Self::Node(node)
    }
}

impl<'a, T> From<&'a str> for NavigationTarget<'a, T> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a, T> From<&'a NodeId> for NavigationTarget<'a, T> {
    fn from(id: &'a NodeId) -> Self {
        Self::Id(id.as_str())
    }
}

// =============================================================================
// TreeModel
// =============================================================================

struct ModelInner<T: NodeData> {
    tree: Tree<T>,
    selection: SelectionService<T>,
    expansion: ExpansionService<T>,
    focus: FocusService<T>,
    navigation: RwLock<NavigationHistory>,
    on_changed: Emitter<()>,
    on_open_node: Emitter<TreeNode<T>>,
    _subscriptions: Vec<Subscription>,
}

/// Composition root over a tree and its view services.
///
/// Cloning is cheap and yields a handle to the same model.
///
/// # Example
///
/// ```ignore
/// let model = TreeModel::new(Tree::with_resolver(FileSystem::new()));
/// model.set_root(Some(NodeDescriptor::composite("/", root_dir).expandable(true))).await?;
///
/// let _changed = model.on_changed().subscribe(|_| request_render());
///
/// if let Some(src) = model.get_node("/src") {
///     model.select_node(&src);
///     model.expand_node(Some(&src)).await?;
/// }
/// model.select_next_node(SelectionType::Range);
/// ```
pub struct TreeModel<T: NodeData = ()> {
    inner: Arc<ModelInner<T>>,
}

impl<T: NodeData> Clone for TreeModel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: NodeData + std::fmt::Debug> std::fmt::Debug for TreeModel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeModel")
            .field("tree", &self.inner.tree)
            .field("selection", &self.inner.selection)
            .field("focus", &self.inner.focus)
            .finish_non_exhaustive()
    }
}

impl<T: NodeData> TreeModel<T> {
    /// Create a model over `tree` with unlimited navigation history.
    pub fn new(tree: Tree<T>) -> Self {
        Self::with_navigation_config(tree, NavigationConfig::default())
    }

    /// Creates a model over `tree` with the given navigation history settings.
    pub fn with_navigation_config(tree: Tree<T>, config: NavigationConfig) -> Self {
        let focus = FocusService::new(tree.clone());
        let selection = SelectionService::new(tree.clone(), focus.clone());
        let expansion = ExpansionService::new(tree.clone());
        let on_changed: Emitter<()> = Emitter::new();

        let inner = Arc::new_cyclic(|weak: &Weak<ModelInner<T>>| {
            let subscriptions = vec![
                tree.on_changed().subscribe({
                    let weak = weak.clone();
                    move |_| {
                        if let Some(model) = Self::upgrade(&weak) {
                            model.inner.selection.sync_flags();
                            model.fire_changed();
                        }
                    }
                }),
                selection.on_selection_changed().subscribe({
                    let on_changed = on_changed.clone();
                    move |_| on_changed.fire(&())
                }),
                expansion.on_expansion_changed().subscribe({
                    let weak = weak.clone();
                    move |node| {
                        if let Some(model) = Self::upgrade(&weak) {
                            model.handle_expansion(node);
                            model.fire_changed();
                        }
                    }
                }),
                tree.on_did_change_busy().subscribe({
                    let on_changed = on_changed.clone();
                    move |_| on_changed.fire(&())
                }),
                focus.on_did_change_focus().subscribe({
                    let on_changed = on_changed.clone();
                    move |_| on_changed.fire(&())
                }),
            ];

            ModelInner {
                tree: tree.clone(),
                selection: selection.clone(),
                expansion: expansion.clone(),
                focus: focus.clone(),
                navigation: RwLock::new(NavigationHistory::new(config)),
                on_changed: on_changed.clone(),
                on_open_node: Emitter::new(),
                _subscriptions: subscriptions,
            }
        });
        Self { inner }
    }

    fn upgrade(weak: &Weak<ModelInner<T>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn fire_changed(&self) {
        self.inner.on_changed.fire(&());
    }

    /// Select a collapsed node if collapsing it hid a selected descendant.
    fn handle_expansion(&self, node: &TreeNode<T>) {
        if !node.is_collapsed() || !node.is_selectable() {
            return;
        }
        let selected = self.inner.selection.selected_nodes();
        let hides_selection = self.inner.tree.read(|store| {
            is_revealed(store, node.id().as_str())
                && selected
                    .iter()
                    .any(|selected| store.is_ancestor(node.id().as_str(), selected.id().as_str()))
        });
        if hides_selection {
            self.inner
                .selection
                .add_selection(TreeSelection::new(node.id(), SelectionType::Default));
        }
    }

    // -------------------------------------------------------------------------
    // Services
    // -------------------------------------------------------------------------

    /// The underlying tree.
    pub fn tree(&self) -> &Tree<T> {
        &self.inner.tree
    }

    pub fn selection(&self) -> &SelectionService<T> {
        &self.inner.selection
    }

    pub fn expansion(&self) -> &ExpansionService<T> {
        &self.inner.expansion
    }

    pub fn focus(&self) -> &FocusService<T> {
        &self.inner.focus
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Fired for any change the view should re-render for: structure,
    /// selection, expansion, busy state and focus.
    pub fn on_changed(&self) -> &Emitter<()> {
        &self.inner.on_changed
    }

    /// Fired when a node without the expandable capability is opened.
    pub fn on_open_node(&self) -> &Emitter<TreeNode<T>> {
        &self.inner.on_open_node
    }

    pub fn on_selection_changed(&self) -> &Emitter<Vec<TreeNode<T>>> {
        self.inner.selection.on_selection_changed()
    }

    pub fn on_expansion_changed(&self) -> &Emitter<TreeNode<T>> {
        self.inner.expansion.on_expansion_changed()
    }

    pub fn on_node_refreshed(&self) -> &Emitter<NodeRefreshed<T>> {
        self.inner.tree.on_node_refreshed()
    }

    pub fn on_did_change_busy(&self) -> &Emitter<TreeNode<T>> {
        self.inner.tree.on_did_change_busy()
    }

    pub fn on_did_change_focus(&self) -> &Emitter<Option<TreeNode<T>>> {
        self.inner.focus.on_did_change_focus()
    }

    // -------------------------------------------------------------------------
    // Tree
    // -------------------------------------------------------------------------

    pub fn root(&self) -> Option<TreeNode<T>> {
        self.inner.tree.root()
    }

    /// Replace the tree. Navigation history is kept, but entries recorded
    /// against the previous tree no longer resolve.
    pub async fn set_root(
        &self,
        root: Option<NodeDescriptor<T>>,
    ) -> Result<Option<TreeNode<T>>, TreeError> {
        self.inner.tree.set_root(root).await
    }

    pub fn get_node(&self, id: &str) -> Option<TreeNode<T>> {
        self.inner.tree.get_node(id)
    }

    pub fn validate_node(&self, node: &TreeNode<T>) -> Option<TreeNode<T>> {
        self.inner.tree.validate_node(node)
    }

    pub async fn refresh(
        &self,
        node: Option<&TreeNode<T>>,
    ) -> Result<Option<TreeNode<T>>, TreeError> {
        self.inner.tree.refresh(node).await
    }

    /// See [`Tree::mark_as_busy`].
    pub fn mark_as_busy(
        &self,
        node: &TreeNode<T>,
        delay: Duration,
        token: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        self.inner.tree.mark_as_busy(node, delay, token)
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    pub fn selected_nodes(&self) -> Vec<TreeNode<T>> {
        self.inner.selection.selected_nodes()
    }

    /// Make `node` the only selected node.
    pub fn select_node(&self, node: &TreeNode<T>) -> bool {
        self.add_selection(node, SelectionType::Default)
    }

    /// Flip `node` in or out of the selection.
    pub fn toggle_node(&self, node: &TreeNode<T>) -> bool {
        self.add_selection(node, SelectionType::Toggle)
    }

    /// Select every visible node between the anchor and `node`.
    pub fn select_range(&self, node: &TreeNode<T>) -> bool {
        self.add_selection(node, SelectionType::Range)
    }

    fn add_selection(&self, node: &TreeNode<T>, kind: SelectionType) -> bool {
        match self.inner.tree.validate_node(node) {
            Some(node) => self
                .inner
                .selection
                .add_selection(TreeSelection::new(node.id(), kind)),
            None => false,
        }
    }

    pub fn clear_selection(&self) {
        self.inner.selection.clear_selection();
    }

    pub fn get_focused_node(&self) -> Option<TreeNode<T>> {
        self.inner.focus.focused_node()
    }

    /// The first visible selectable node after `node`, which defaults to the
    /// focused node, or the root when nothing is focused.
    pub fn get_next_selectable_node(&self, node: Option<&TreeNode<T>>) -> Option<TreeNode<T>> {
        self.find_selectable(node, IterOptions::forward())
    }

    /// The first visible selectable node before `node`. See
    /// [`get_next_selectable_node`](Self::get_next_selectable_node).
    pub fn get_prev_selectable_node(&self, node: Option<&TreeNode<T>>) -> Option<TreeNode<T>> {
        self.find_selectable(node, IterOptions::backward())
    }

    fn find_selectable(
        &self,
        node: Option<&TreeNode<T>>,
        options: IterOptions,
    ) -> Option<TreeNode<T>> {
        let origin = match node {
            Some(node) => self.inner.tree.validate_node(node)?,
            None => self.get_focused_node().or_else(|| self.root())?,
        };
        self.inner.tree.read(|store| {
            store
                .iter(origin.id().as_str(), options.with_include_start(false))
                .find(|node| node.is_selectable())
                .and_then(|node| store.snapshot(node.id().as_str()))
        })
    }

    /// Select the node after the focused one.
    pub fn select_next_node(&self, kind: SelectionType) -> Option<TreeNode<T>> {
        let next = self.get_next_selectable_node(None)?;
        self.add_selection(&next, kind).then_some(next)
    }

    /// Select the node before the focused one.
    pub fn select_prev_node(&self, kind: SelectionType) -> Option<TreeNode<T>> {
        let prev = self.get_prev_selectable_node(None)?;
        self.add_selection(&prev, kind).then_some(prev)
    }

    /// When exactly one node is selected, select its nearest visible
    /// selectable ancestor.
    pub fn select_parent(&self) -> Option<TreeNode<T>> {
        let [selected]: [TreeNode<T>; 1] = self.selected_nodes().try_into().ok()?;
        let parent = self.inner.tree.read(|store| {
            let mut current = store.parent(selected.id().as_str());
            while let Some(node) = current {
                if node.is_selectable() && is_revealed(store, node.id().as_str()) {
                    return store.snapshot(node.id().as_str());
                }
                current = store.parent(node.id().as_str());
            }
            None
        })?;
        self.select_node(&parent).then_some(parent)
    }

    // -------------------------------------------------------------------------
    // Expansion
    // -------------------------------------------------------------------------

    /// Expand `node`, or the best expandable candidate: the focused node,
    /// then the selected nodes from most recent.
    pub async fn expand_node(
        &self,
        node: Option<&TreeNode<T>>,
    ) -> Result<Option<TreeNode<T>>, TreeError> {
        match self.expansion_candidate(node) {
            Some(node) => self.inner.expansion.expand_node(&node).await,
            None => Ok(None),
        }
    }

    pub fn collapse_node(&self, node: Option<&TreeNode<T>>) -> bool {
        self.expansion_candidate(node)
            .is_some_and(|node| self.inner.expansion.collapse_node(&node))
    }

    /// Collapse `node` (or the candidate, or the root) and all its
    /// descendants.
    pub fn collapse_all(&self, node: Option<&TreeNode<T>>) -> bool {
        let target = match node {
            Some(node) => Some(node.clone()),
            None => self.expansion_candidate(None).or_else(|| self.root()),
        };
        target.is_some_and(|node| self.inner.expansion.collapse_all(&node))
    }

    pub async fn toggle_node_expansion(
        &self,
        node: Option<&TreeNode<T>>,
    ) -> Result<bool, TreeError> {
        match self.expansion_candidate(node) {
            Some(node) => self.inner.expansion.toggle_node_expansion(&node).await,
            None => Ok(false),
        }
    }

    fn expansion_candidate(&self, node: Option<&TreeNode<T>>) -> Option<TreeNode<T>> {
        if let Some(node) = node {
            return self
                .inner
                .tree
                .validate_node(node)
                .filter(TreeNode::is_expandable);
        }
        self.get_focused_node()
            .into_iter()
            .chain(self.selected_nodes())
            .find(TreeNode::is_expandable)
    }

    /// Open `node` (default: the focused node). Expandable nodes toggle,
    /// other nodes are handed to [`on_open_node`](Self::on_open_node).
    pub async fn open_node(&self, node: Option<&TreeNode<T>>) -> Result<(), TreeError> {
        let node = match node {
            Some(node) => self.inner.tree.validate_node(node),
            None => self.get_focused_node(),
        };
        let Some(node) = node else {
            return Ok(());
        };
        if node.is_expandable() {
            self.inner.expansion.toggle_node_expansion(&node).await?;
        } else {
            self.inner.on_open_node.fire(&node);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Make `target` the root, recording the current root for
    /// [`navigate_backward`](Self::navigate_backward).
    ///
    /// Returns `None` if the target is unknown. If resolving the new root's
    /// children fails, the previous root is restored, history is left
    /// untouched and the error is returned.
    pub async fn navigate_to<'a>(
        &self,
        target: impl Into<NavigationTarget<'a, T>>,
    ) -> Result<Option<TreeNode<T>>, TreeError> {
        let node = match target.into() {
            NavigationTarget::Node(node) => self.inner.tree.validate_node(node),
            NavigationTarget::Id(id) => self.inner.tree.get_node(id),
        };
        let Some(node) = node else {
            return Ok(None);
        };
        let current = self.inner.tree.root_ref();
        let navigated = self.do_navigate(&node.node_ref()).await?;
        if navigated.is_some()
            && let Some(current) = current
        {
            self.navigation_mut().push(current);
        }
        Ok(navigated)
    }

    /// Return to the previous root. Returns `false` if there is none or it
    /// no longer exists, leaving history untouched. A resolution failure
    /// also leaves root and history untouched.
    pub async fn navigate_backward(&self) -> Result<bool, TreeError> {
        let Some(target) = self.navigation().peek_backward().cloned() else {
            return Ok(false);
        };
        if !self.inner.tree.is_live(&target) {
            log::debug!("previous root `{}` no longer exists", target.id());
            return Ok(false);
        }
        let current = self.inner.tree.root_ref();
        if self.do_navigate(&target).await?.is_none() {
            return Ok(false);
        }
        self.navigation_mut().step_backward(current);
        Ok(true)
    }

    /// Undo the last [`navigate_backward`](Self::navigate_backward).
    pub async fn navigate_forward(&self) -> Result<bool, TreeError> {
        let Some(target) = self.navigation().peek_forward().cloned() else {
            return Ok(false);
        };
        if !self.inner.tree.is_live(&target) {
            log::debug!("next root `{}` no longer exists", target.id());
            return Ok(false);
        }
        let current = self.inner.tree.root_ref();
        if self.do_navigate(&target).await?.is_none() {
            return Ok(false);
        }
        self.navigation_mut().step_forward(current);
        Ok(true)
    }

    pub fn can_navigate_backward(&self) -> bool {
        self.navigation().can_navigate_backward()
    }

    pub fn can_navigate_forward(&self) -> bool {
        self.navigation().can_navigate_forward()
    }

    /// Re-root at `node`, then resolve and expand it. On failure the
    /// previous root is put back.
    async fn do_navigate(&self, node: &NodeRef) -> Result<Option<TreeNode<T>>, TreeError> {
        let previous = self.inner.tree.root_ref();
        if !self.inner.tree.navigate_root(node) {
            return Ok(None);
        }
        let Some(root) = self.root() else {
            return Ok(None);
        };
        if let Err(err) = self.reveal_root(&root).await {
            log::warn!("navigation to `{}` failed: {err}", root.id());
            if let Some(previous) = previous {
                self.inner.tree.navigate_root(&previous);
            }
            return Err(err);
        }
        if root.is_selectable() {
            self.select_node(&root);
        }
        Ok(self.root())
    }

    async fn reveal_root(&self, root: &TreeNode<T>) -> Result<(), TreeError> {
        self.inner.tree.refresh(Some(root)).await?;
        if root.is_collapsed() {
            self.inner.expansion.expand_node(root).await?;
        }
        Ok(())
    }

    fn navigation(&self) -> std::sync::RwLockReadGuard<'_, NavigationHistory> {
        self.inner
            .navigation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn navigation_mut(&self) -> std::sync::RwLockWriteGuard<'_, NavigationHistory> {
        self.inner
            .navigation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    /// Snapshot of the view state for persistence.
    pub fn store_state(&self) -> TreeModelState {
        TreeModelState::new(self.inner.selection.store_state())
    }

    /// Restore a snapshot taken with [`store_state`](Self::store_state).
    pub fn restore_state(&self, state: TreeModelState) -> Result<(), TreeError> {
        state.check_version()?;
        self.inner.selection.restore_state(state.selection)
    }
}

/// Whether a node is visible and no ancestor hides it.
fn is_revealed<T: NodeData>(store: &NodeStore<T>, id: &str) -> bool {
    let Some(node) = store.get(id) else {
        return false;
    };
    if !node.is_visible() {
        return false;
    }
    let mut current = store.parent(id);
    while let Some(ancestor) = current {
        if !ancestor.is_visible() || ancestor.is_collapsed() {
            return false;
        }
        current = store.parent(ancestor.id().as_str());
    }
    true
}
