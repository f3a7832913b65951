//! Child refresh with per-node coalescing.

use std::sync::atomic::Ordering;

use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::Tree;
use crate::error::TreeError;
use crate::event::NodeRefreshed;
use crate::node::{NodeData, NodeId, TreeNode};

type RefreshResult<T> = Result<Option<TreeNode<T>>, TreeError>;

type SharedRefresh<T> = Shared<BoxFuture<'static, RefreshResult<T>>>;

/// An in-flight refresh that later callers join.
pub(crate) struct PendingRefresh<T> {
    ticket: u64,
    stamp: u64,
    future: SharedRefresh<T>,
}

impl<T: NodeData> Tree<T> {
    /// Resolve the children of `node` (or of the root) and swap them in.
    ///
    /// Children that keep their id and capabilities keep their node along
    /// with its selection, expansion and subtree. Listeners of
    /// [`on_node_refreshed`](Self::on_node_refreshed) run after the swap and
    /// may extend the refresh with
    /// [`wait_until`](NodeRefreshed::wait_until).
    ///
    /// At most one resolution runs per node: calling `refresh` again while
    /// one is pending returns the pending result. The resolution runs on the
    /// tokio runtime when there is one, so it completes and is applied even
    /// if the caller drops the returned future.
    ///
    /// Returns `None` if the node is stale or not composite. On a resolver
    /// error the previous children are kept and the error is returned.
    pub async fn refresh(&self, node: Option<&TreeNode<T>>) -> RefreshResult<T> {
        let target = self.read(|store| {
            let target = match node {
                Some(node) => store.validate(node),
                None => store.root(),
            };
            target.cloned()
        });
        match target {
            Some(target) if target.is_composite() => self.join_refresh(target).await,
            _ => Ok(None),
        }
    }

    fn join_refresh(&self, target: TreeNode<T>) -> SharedRefresh<T> {
        match self.inner.pending.entry(target.id.clone()) {
            Entry::Occupied(entry) if entry.get().stamp == target.stamp => {
                log::debug!("joining in-flight refresh of `{}`", target.id);
                entry.get().future.clone()
            }
            entry => {
                let ticket = self.inner.tickets.fetch_add(1, Ordering::Relaxed);
                let stamp = target.stamp;
                let future = self.spawn_refresh(target, ticket).shared();
                entry.insert(PendingRefresh {
                    ticket,
                    stamp,
                    future: future.clone(),
                });
                future
            }
        }
    }

    fn spawn_refresh(
        &self,
        target: TreeNode<T>,
        ticket: u64,
    ) -> BoxFuture<'static, RefreshResult<T>> {
        let id = target.id.clone();
        let work = {
            let tree = self.clone();
            let id = id.clone();
            async move {
                let result = tree.do_refresh(target).await;
                tree.finish_refresh(&id, ticket);
                result
            }
        };

        let Ok(handle) = Handle::try_current() else {
            return work.boxed();
        };
        let task = handle.spawn(work);
        let tree = self.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(err) => {
                    tree.finish_refresh(&id, ticket);
                    Err(TreeError::RefreshAborted {
                        id,
                        reason: err.to_string(),
                    })
                }
            }
        }
        .boxed()
    }

    fn finish_refresh(&self, id: &NodeId, ticket: u64) {
        self.inner
            .pending
            .remove_if(id, |_, pending| pending.ticket == ticket);
    }

    async fn do_refresh(&self, target: TreeNode<T>) -> RefreshResult<T> {
        let busy = CancellationToken::new();
        let _busy = busy.clone().drop_guard();
        self.mark_as_busy(&target, self.inner.config.refresh_busy_delay, busy);

        let children = match &self.inner.resolver {
            Some(resolver) => match resolver.resolve_children(&target).await {
                Ok(children) => Some(children),
                Err(err) => {
                    log::warn!("failed to resolve children of `{}`: {err}", target.id);
                    self.fire_changed();
                    return Err(TreeError::resolution(target.id.clone(), err));
                }
            },
            None => None,
        };

        let target_ref = target.node_ref();
        let applied = self.update(|store| store.apply_children(&target_ref, children));
        let Some(refreshed) = applied else {
            log::debug!("`{}` went away before its children were applied", target.id);
            self.fire_changed();
            return Ok(None);
        };
        log::debug!(
            "refreshed `{}` ({} children)",
            refreshed.id,
            refreshed.children().len()
        );

        let event = NodeRefreshed::new(refreshed);
        self.inner.on_node_refreshed.fire(&event);
        join_all(event.take_waits()).await;

        self.fire_changed();
        Ok(self.read(|store| store.snapshot_ref(&target_ref)))
    }
}
