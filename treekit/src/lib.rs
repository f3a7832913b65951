//! Renderer-agnostic tree model.
//!
//! `treekit` is the data side of tree views such as file explorers, outlines
//! and call hierarchies. It owns the node graph and the view state around it
//! and leaves drawing to the caller.
//!
//! # Overview
//!
//! - [`Tree`] stores nodes by id and resolves children lazily through a
//!   [`ChildResolver`]. Concurrent refreshes of one node share a single
//!   resolution.
//! - [`TreeIterator`] walks visible nodes in either direction.
//! - [`SelectionState`] derives the selected set from a stack of
//!   default, toggle and range requests; [`SelectionService`] applies it.
//! - [`ExpansionService`] expands and collapses nodes.
//! - [`NavigationHistory`] records previous roots for back/forward.
//! - [`TreeModel`] combines all of the above behind one API and one
//!   change event.
//!
//! # Example
//!
//! ```ignore
//! use treekit::{NodeDescriptor, SelectionType, Tree, TreeModel};
//!
//! let tree = Tree::builder()
//!     .resolver_fn(|parent| async move { load_children(parent.id()).await })
//!     .build();
//! let model = TreeModel::new(tree);
//!
//! model.set_root(Some(NodeDescriptor::composite("workspace", ()).expandable(true))).await?;
//! model.select_next_node(SelectionType::Default);
//! model.expand_node(None).await?;
//!
//! let saved = model.store_state().to_json()?;
//! ```

pub mod error;
pub mod event;
pub mod expansion;
pub mod focus;
pub mod iterator;
pub mod model;
pub mod navigation;
pub mod node;
pub mod selection;
pub mod tree;

pub use error::{ResolveError, TreeError};
pub use event::{Emitter, Listener, NodeRefreshed, Subscription};
pub use expansion::ExpansionService;
pub use focus::FocusService;
pub use iterator::{Direction, IterOptions, TreeIterator};
pub use model::{NavigationTarget, STATE_VERSION, TreeModel, TreeModelState};
pub use navigation::{NavigationConfig, NavigationHistory};
pub use node::{Capability, NodeData, NodeDescriptor, NodeId, NodeRef, TreeNode};
pub use selection::{
    FocusableSelection, SelectionService, SelectionState, SelectionType, TreeSelection,
};
pub use tree::{ChildResolver, FnResolver, NodeStore, Tree, TreeBuilder, TreeConfig, WeakTree};

/// Re-export of the cancellation token accepted by busy markers.
pub use tokio_util::sync::CancellationToken;
