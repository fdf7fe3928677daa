use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::ChangeListener;
use super::ConfigStore;
use super::SubscriptionKey;
use crate::Result;

/// In-process configuration store.
///
/// Holds one value and at most one listener per key, mirroring how a remote
/// store client keeps a single listen registration per dataId/group.
#[derive(Default)]
pub struct MemoryConfigStore {
    entries: DashMap<SubscriptionKey, String>,
    listeners: RwLock<HashMap<SubscriptionKey, ChangeListener>>,
    get_calls: AtomicU64,
    watch_calls: AtomicU64,
    cancel_calls: AtomicU64,
}

impl std::fmt::Debug for MemoryConfigStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemoryConfigStore")
            .field("entries", &self.entries)
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` under `key` and push it to the key's listener.
    ///
    /// Returns whether a listener was notified. The listener runs on the
    /// calling thread with no store lock held.
    pub fn publish(
        &self,
        key: &SubscriptionKey,
        payload: impl Into<String>,
    ) -> bool {
        let payload = payload.into();
        self.entries.insert(key.clone(), payload.clone());
        self.notify(key, &payload)
    }

    /// Delete `key`; a watching listener observes an empty payload.
    pub fn remove(
        &self,
        key: &SubscriptionKey,
    ) -> Option<String> {
        let removed = self.entries.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.notify(key, "");
        }
        removed
    }

    fn notify(
        &self,
        key: &SubscriptionKey,
        payload: &str,
    ) -> bool {
        let listener = self.listeners.read().get(key).cloned();
        match listener {
            Some(listener) => {
                trace!(%key, "push change to listener");
                listener(key, payload);
                true
            }
            None => false,
        }
    }

    pub fn is_watched(
        &self,
        key: &SubscriptionKey,
    ) -> bool {
        self.listeners.read().contains_key(key)
    }

    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Acquire)
    }

    pub fn watch_calls(&self) -> u64 {
        self.watch_calls.load(Ordering::Acquire)
    }

    pub fn cancel_calls(&self) -> u64 {
        self.cancel_calls.load(Ordering::Acquire)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(
        &self,
        key: &SubscriptionKey,
    ) -> Result<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::AcqRel);
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn watch(
        &self,
        key: &SubscriptionKey,
        listener: ChangeListener,
    ) -> Result<()> {
        self.watch_calls.fetch_add(1, Ordering::AcqRel);
        if self.listeners.write().insert(key.clone(), listener).is_some() {
            debug!(%key, "listener replaced");
        }
        Ok(())
    }

    fn cancel_watch(
        &self,
        key: &SubscriptionKey,
    ) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::AcqRel);
        self.listeners.write().remove(key);
        Ok(())
    }
}
