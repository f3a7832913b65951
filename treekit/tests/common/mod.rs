//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use treekit::{
    ChildResolver, NodeDescriptor, ResolveError, Tree, TreeConfig, TreeModel, TreeNode,
};

/// Resolver backed by a map from parent id to children.
///
/// Counts calls per parent, can be told to fail for a parent, and can hold
/// resolutions at a gate until the test releases them.
#[derive(Clone, Default)]
pub struct Fixture {
    inner: Arc<FixtureInner>,
}

#[derive(Default)]
struct FixtureInner {
    children: Mutex<HashMap<String, Vec<NodeDescriptor>>>,
    calls: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    gated: AtomicBool,
    gate: Notify,
}

/// ```text
/// root
/// ├── src          (collapsed)
/// │   ├── src/lib.rs
/// │   └── src/main.rs
/// ├── docs         (collapsed)
/// │   └── docs/guide   (collapsed)
/// │       └── docs/guide/intro.md
/// ├── README.md
/// └── .git         (hidden)
/// ```
impl Fixture {
    pub fn new() -> Self {
        let fixture = Self::default();
        fixture.set_children(
            "root",
            vec![
                dir("src"),
                dir("docs"),
                file("README.md"),
                dir(".git").visible(false),
            ],
        );
        fixture.set_children("src", vec![file("src/lib.rs"), file("src/main.rs")]);
        fixture.set_children("docs", vec![dir("docs/guide")]);
        fixture.set_children("docs/guide", vec![file("docs/guide/intro.md")]);
        fixture
    }

    pub fn set_children(&self, parent: &str, children: Vec<NodeDescriptor>) {
        self.inner
            .children
            .lock()
            .unwrap()
            .insert(parent.to_string(), children);
    }

    pub fn fail(&self, parent: &str) {
        self.inner.failing.lock().unwrap().insert(parent.to_string());
    }

    pub fn recover(&self, parent: &str) {
        self.inner.failing.lock().unwrap().remove(parent);
    }

    pub fn calls(&self, parent: &str) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .get(parent)
            .copied()
            .unwrap_or(0)
    }

    /// Hold every following resolution until [`release`](Self::release).
    pub fn close_gate(&self) {
        self.inner.gated.store(true, Ordering::SeqCst);
    }

    /// Let one held resolution through.
    pub fn release(&self) {
        self.inner.gate.notify_one();
    }

    pub fn open_gate(&self) {
        self.inner.gated.store(false, Ordering::SeqCst);
        self.inner.gate.notify_waiters();
    }

    pub fn tree(&self) -> Tree {
        self.tree_with(TreeConfig::default())
    }

    pub fn tree_with(&self, config: TreeConfig) -> Tree {
        Tree::builder().resolver(self.clone()).config(config).build()
    }

    /// A model over a fresh tree with `root` set and resolved.
    pub async fn model(&self) -> TreeModel {
        let model = TreeModel::new(self.tree());
        model.set_root(Some(root())).await.unwrap();
        model
    }
}

#[async_trait]
impl ChildResolver<()> for Fixture {
    async fn resolve_children(
        &self,
        parent: &TreeNode,
    ) -> Result<Vec<NodeDescriptor>, ResolveError> {
        let id = parent.id().to_string();
        *self.inner.calls.lock().unwrap().entry(id.clone()).or_default() += 1;

        if self.inner.gated.load(Ordering::SeqCst) {
            self.inner.gate.notified().await;
        }
        if self.inner.failing.lock().unwrap().contains(&id) {
            return Err(ResolveError::new(format!("cannot list `{id}`")));
        }
        Ok(self
            .inner
            .children
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn root() -> NodeDescriptor {
    NodeDescriptor::composite("root", ())
}

pub fn dir(id: &str) -> NodeDescriptor {
    NodeDescriptor::composite(id, ()).selectable().expandable(false)
}

pub fn file(id: &str) -> NodeDescriptor {
    NodeDescriptor::leaf(id, ()).selectable()
}

pub fn node(model: &TreeModel, id: &str) -> TreeNode {
    model
        .get_node(id)
        .unwrap_or_else(|| panic!("node `{id}` should exist"))
}

pub fn ids(nodes: &[TreeNode]) -> Vec<String> {
    let mut ids: Vec<String> = nodes.iter().map(|node| node.id().to_string()).collect();
    ids.sort();
    ids
}
