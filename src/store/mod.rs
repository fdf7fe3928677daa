//! Configuration store capability consumed by the watch multiplexer.
//!
//! The wire client (connect, long-poll/push, auth) lives outside this crate.
//! Anything that can fetch a value, watch a key and cancel that watch can
//! back the policy synchronization core.

mod memory;
pub use memory::*;


use std::fmt;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Identity of one store entry (e.g. nacos dataId + group).
///
/// Used as the deduplication key for upstream watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    pub dataset: String,
    pub group: String,
}

impl SubscriptionKey {
    pub fn new(
        dataset: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.dataset)
    }
}

/// Upstream change callback handed to [`ConfigStore::watch`].
///
/// Invoked on store-owned threads with the key and the raw payload.
pub type ChangeListener = Arc<dyn Fn(&SubscriptionKey, &str) + Send + Sync>;

#[cfg_attr(test, automock)]
pub trait ConfigStore: Send + Sync + 'static {
    /// Fetch the current value.
    ///
    /// `Ok(None)` means the key does not exist upstream, which callers treat
    /// as "use defaults" rather than as a failure.
    fn get(
        &self,
        key: &SubscriptionKey,
    ) -> Result<Option<String>>;

    /// Establish an upstream watch; `listener` receives every later change.
    fn watch(
        &self,
        key: &SubscriptionKey,
        listener: ChangeListener,
    ) -> Result<()>;

    fn cancel_watch(
        &self,
        key: &SubscriptionKey,
    ) -> Result<()>;
}
