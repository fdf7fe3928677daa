//! Watch multiplexer for policy subscriptions
//!
//! Many logical policy subscriptions share few upstream store watches: at
//! most one watch is held per [`SubscriptionKey`], and every upstream change
//! is fanned out to all subscribers registered for that key.
//!
//! # Protocol
//!
//! ```text
//! register(key, id, on_change):
//!   lifecycle lock(key)
//!     fetch current value ──► on_change(value)        [phase 1: initial]
//!     insert subscriber
//!     first subscriber? ──► store.watch(key)           [phase 2: ongoing]
//!
//! store push ──► dispatch(key, payload):
//!   snapshot subscribers under read lock, release
//!   deliver to each live subscriber
//!
//! deregister(key, id):
//!   lifecycle lock(key)
//!     remove subscriber
//!     last subscriber? ──► store.cancel_watch(key), then retire the entry
//!   wait for in-flight delivery to that subscriber
//! ```
//!
//! # Locking
//!
//! - `keys` (DashMap) shard locks are only held long enough to clone an
//!   `Arc<KeyState>`.
//! - The per-key lifecycle mutex serializes register/deregister for one key,
//!   including the blocking store calls. Keys never contend with each other.
//! - The subscriber map lock is never held while user callbacks run.
//! - Each subscriber has a gate: deliveries hold it shared, retirement takes
//!   it exclusively, so no callback runs after `deregister` returns.
//!
//! A callback must not register or deregister on its own key.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::ChangeListener;
use crate::ConfigStore;
use crate::Result;
use crate::SubscriptionKey;

pub type SubscriberId = u64;

/// Per-subscriber change callback, invoked with the raw payload.
pub type OnChange = Arc<dyn Fn(&str) + Send + Sync>;

struct Subscriber {
    id: SubscriberId,
    on_change: OnChange,
    /// `true` while deliveries are allowed
    gate: RwLock<bool>,
}

impl Subscriber {
    fn new(
        id: SubscriberId,
        on_change: OnChange,
    ) -> Self {
        Self {
            id,
            on_change,
            gate: RwLock::new(true),
        }
    }

    fn deliver(
        &self,
        payload: &str,
    ) -> bool {
        // Recursive read: a callback may trigger a nested push for its own key.
        let live = self.gate.read_recursive();
        if !*live {
            return false;
        }
        (self.on_change)(payload);
        true
    }

    /// Blocks until in-flight deliveries finish.
    fn retire(&self) {
        *self.gate.write() = false;
    }
}

#[derive(Default)]
struct Lifecycle {
    upstream_active: bool,
    /// Set once the entry left `keys`; registrations must start over.
    retired: bool,
}

#[derive(Default)]
struct KeyState {
    lifecycle: Mutex<Lifecycle>,
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
}

struct MultiplexerInner {
    store: Arc<dyn ConfigStore>,
    keys: DashMap<SubscriptionKey, Arc<KeyState>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MultiplexerInner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MultiplexerInner")
            .field("keys", &self.keys.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

/// Shares one upstream store watch per key across many subscribers.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct WatchMultiplexer {
    inner: Arc<MultiplexerInner>,
}

impl WatchMultiplexer {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            inner: Arc::new(MultiplexerInner {
                store,
                keys: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Allocate a subscriber id, unique for this multiplexer's lifetime.
    pub fn next_subscriber_id(&self) -> SubscriberId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register `on_change` for `key` under `id`.
    ///
    /// Before returning, `on_change` has been invoked once with the current
    /// value (empty when the key does not exist upstream). The first
    /// subscriber of a key also establishes the upstream watch. Registering
    /// an `(key, id)` pair that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Fetch failures other than "not found", and watch establishment
    /// failures. Nothing stays registered in that case.
    pub fn register(
        &self,
        key: SubscriptionKey,
        id: SubscriberId,
        on_change: OnChange,
    ) -> Result<()> {
        self.inner.register(key, id, on_change)
    }

    /// Allocate an id and register; the returned handle owns the registration.
    pub fn subscribe(
        &self,
        key: SubscriptionKey,
        on_change: OnChange,
    ) -> Result<Subscription> {
        let id = self.next_subscriber_id();
        self.inner.register(key.clone(), id, on_change)?;
        Ok(Subscription {
            key,
            id,
            multiplexer: Some(self.clone()),
        })
    }

    /// Remove a subscriber; the last one for `key` cancels the upstream watch.
    ///
    /// Local bookkeeping is always removed, even when the upstream cancel
    /// fails. After this returns, `on_change` of `id` is never invoked again.
    pub fn deregister(
        &self,
        key: &SubscriptionKey,
        id: SubscriberId,
    ) -> Result<()> {
        self.inner.deregister(key, id)
    }

    /// Fan `payload` out to every current subscriber of `key`.
    ///
    /// Returns the number of subscribers that received it.
    pub fn dispatch(
        &self,
        key: &SubscriptionKey,
        payload: &str,
    ) -> usize {
        self.inner.dispatch(key, payload)
    }

    pub fn watcher_count(
        &self,
        key: &SubscriptionKey,
    ) -> usize {
        let Some(state) = self.inner.state(key) else {
            return 0;
        };
        let count = state.subscribers.read().len();
        count
    }

    pub fn watched_key_count(&self) -> usize {
        self.inner.keys.len()
    }

    pub fn is_watching(
        &self,
        key: &SubscriptionKey,
    ) -> bool {
        let Some(state) = self.inner.state(key) else {
            return false;
        };
        let active = state.lifecycle.lock().upstream_active;
        active
    }
}

impl MultiplexerInner {
    /// Clones the entry out so no shard lock outlives this call.
    fn state(
        &self,
        key: &SubscriptionKey,
    ) -> Option<Arc<KeyState>> {
        self.keys.get(key).map(|entry| entry.value().clone())
    }

    fn register(
        self: &Arc<Self>,
        key: SubscriptionKey,
        id: SubscriberId,
        on_change: OnChange,
    ) -> Result<()> {
        loop {
            let state = self.keys.entry(key.clone()).or_default().value().clone();
            let mut lifecycle = state.lifecycle.lock();
            if lifecycle.retired {
                // Raced with the last deregistration of this key.
                continue;
            }

            if state.subscribers.read().contains_key(&id) {
                debug!(%key, subscriber_id = id, "subscriber already registered");
                return Ok(());
            }

            let payload = match self.store.get(&key) {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    debug!(%key, "key does not exist upstream, delivering empty payload");
                    String::new()
                }
                Err(e) => {
                    self.retire_if_unused(&key, &state, &mut lifecycle);
                    return Err(e);
                }
            };

            let subscriber = Arc::new(Subscriber::new(id, on_change));
            subscriber.deliver(&payload);
            state.subscribers.write().insert(id, subscriber);

            if !lifecycle.upstream_active {
                debug!(%key, subscriber_id = id, "first subscriber, watching upstream");
                if let Err(e) = self.store.watch(&key, self.listener()) {
                    state.subscribers.write().remove(&id);
                    self.retire_if_unused(&key, &state, &mut lifecycle);
                    return Err(e);
                }
                lifecycle.upstream_active = true;
            }

            trace!(%key, subscriber_id = id, "subscriber registered");
            return Ok(());
        }
    }

    fn deregister(
        &self,
        key: &SubscriptionKey,
        id: SubscriberId,
    ) -> Result<()> {
        let Some(state) = self.state(key) else {
            return Ok(());
        };

        let (subscriber, cancel_result) = {
            let mut lifecycle = state.lifecycle.lock();
            if lifecycle.retired {
                return Ok(());
            }
            let Some(subscriber) = state.subscribers.write().remove(&id) else {
                return Ok(());
            };
            trace!(%key, subscriber_id = id, "subscriber deregistered");

            let mut cancel_result = Ok(());
            if state.subscribers.read().is_empty() {
                // Cancel while the entry is still registered: a racing
                // register blocks on this lifecycle lock, then sees the entry
                // retired and watches afresh.
                if lifecycle.upstream_active {
                    debug!(%key, "last subscriber gone, cancelling upstream watch");
                    cancel_result = self.store.cancel_watch(key);
                }
                self.retire_if_unused(key, &state, &mut lifecycle);
            }
            (subscriber, cancel_result)
        };

        subscriber.retire();
        cancel_result
    }

    fn dispatch(
        &self,
        key: &SubscriptionKey,
        payload: &str,
    ) -> usize {
        let Some(state) = self.state(key) else {
            trace!(%key, "no subscribers, change dropped");
            return 0;
        };

        let snapshot: Vec<Arc<Subscriber>> = state.subscribers.read().values().cloned().collect();

        let mut delivered = 0;
        for subscriber in snapshot {
            if subscriber.deliver(payload) {
                delivered += 1;
            } else {
                trace!(%key, subscriber_id = subscriber.id, "skipped retired subscriber");
            }
        }

        trace!(%key, delivered, "change dispatched");
        delivered
    }

    /// Drop `state` from the registry when it has no subscribers left.
    ///
    /// Caller holds the lifecycle lock of `state`.
    fn retire_if_unused(
        &self,
        key: &SubscriptionKey,
        state: &Arc<KeyState>,
        lifecycle: &mut Lifecycle,
    ) {
        if !state.subscribers.read().is_empty() {
            return;
        }
        lifecycle.retired = true;
        lifecycle.upstream_active = false;
        self.keys.remove_if(key, |_, current| Arc::ptr_eq(current, state));
    }

    fn listener(self: &Arc<Self>) -> ChangeListener {
        let inner: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |key: &SubscriptionKey, payload: &str| {
            if let Some(inner) = inner.upgrade() {
                inner.dispatch(key, payload);
            }
        })
    }
}

/// Owned registration returned by [`WatchMultiplexer::subscribe`].
///
/// Prefer [`Subscription::close`] to observe cancel errors; dropping an open
/// subscription deregisters it and only logs failures.
#[derive(Debug)]
pub struct Subscription {
    key: SubscriptionKey,
    id: SubscriberId,
    multiplexer: Option<WatchMultiplexer>,
}

impl Subscription {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn close(mut self) -> Result<()> {
        match self.multiplexer.take() {
            Some(multiplexer) => multiplexer.deregister(&self.key, self.id),
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(multiplexer) = self.multiplexer.take() {
            if let Err(e) = multiplexer.deregister(&self.key, self.id) {
                warn!(key = %self.key, subscriber_id = self.id, "deregister on drop failed: {:?}", e);
            }
        }
    }
}
