//! Synchronous event emitters scoped to one tree or model instance.
//!
//! Listeners run on the thread that fires the event, in subscription order.
//! The listener list is copied before dispatch, so a listener may subscribe,
//! unsubscribe or fire further events without deadlocking.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::node::TreeNode;

/// Callback invoked for every fired event.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

type ListenerList<E> = Mutex<Vec<(u64, Listener<E>)>>;

/// A publish/subscribe list for one event type.
///
/// Cloning an emitter yields a handle to the same listener list.
pub struct Emitter<E> {
    listeners: Arc<ListenerList<E>>,
    next_id: Arc<AtomicU64>,
}

impl<E: 'static> Emitter<E> {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        let listeners: Weak<ListenerList<E>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Deliver an event to every current listener.
    pub fn fire(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<E> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|guard| guard.len()).unwrap_or(0);
        f.debug_struct("Emitter")
            .field("listeners", &count)
            .finish()
    }
}

/// Registration handle returned by [`Emitter::subscribe`].
///
/// Dropping it removes the listener.
#[must_use = "dropping a subscription removes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Keep the listener registered for the lifetime of the emitter.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

// =============================================================================
// NodeRefreshed
// =============================================================================

/// Fired after a composite's children were replaced.
///
/// Listeners may call [`wait_until`](Self::wait_until) to make the refresh
/// wait for follow-up work (for example refreshing expanded children) before
/// it resolves.
pub struct NodeRefreshed<T> {
    node: TreeNode<T>,
    waits: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl<T> NodeRefreshed<T> {
    pub(crate) fn new(node: TreeNode<T>) -> Self {
        Self {
            node,
            waits: Mutex::new(Vec::new()),
        }
    }

    /// The refreshed composite.
    pub fn node(&self) -> &TreeNode<T> {
        &self.node
    }

    /// Delay completion of the refresh until `work` finishes.
    pub fn wait_until(&self, work: impl Future<Output = ()> + Send + 'static) {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(work.boxed());
    }

    pub(crate) fn take_waits(&self) -> Vec<BoxFuture<'static, ()>> {
        std::mem::take(&mut *self.waits.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for NodeRefreshed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRefreshed")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fire_reaches_all_listeners() {
        let emitter: Emitter<u32> = Emitter::new();
        let total = Arc::new(AtomicUsize::new(0));

        let first = {
            let total = Arc::clone(&total);
            emitter.subscribe(move |value| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            })
        };
        let second = {
            let total = Arc::clone(&total);
            emitter.subscribe(move |value| {
                total.fetch_add(*value as usize * 10, Ordering::SeqCst);
            })
        };

        emitter.fire(&2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
        assert_eq!(emitter.listener_count(), 2);

        drop(first);
        drop(second);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let emitter: Emitter<()> = Emitter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let calls = Arc::clone(&calls);
            emitter.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        emitter.fire(&());
        drop(subscription);
        emitter.fire(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_detached_subscription_stays() {
        let emitter: Emitter<()> = Emitter::new();
        emitter.subscribe(|_| {}).detach();
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn test_listener_can_subscribe_while_firing() {
        let emitter: Emitter<()> = Emitter::new();
        let inner = emitter.clone();
        let keep = Arc::new(Mutex::new(Vec::new()));

        let subscription = {
            let keep = Arc::clone(&keep);
            emitter.subscribe(move |_| {
                let nested = inner.subscribe(|_| {});
                keep.lock().unwrap().push(nested);
            })
        };

        emitter.fire(&());
        assert_eq!(emitter.listener_count(), 2);
        drop(subscription);
    }
}
