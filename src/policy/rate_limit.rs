use std::sync::Arc;

use arc_swap::ArcSwap;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

/// Limiter payload as published in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub connection_limit: u64,
    #[serde(default)]
    pub qps_limit: u64,
}

/// Limits handed to the limiter; zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitValues {
    pub max_connections: u64,
    pub max_qps: u64,
}

impl From<LimiterConfig> for LimitValues {
    fn from(config: LimiterConfig) -> Self {
        Self {
            max_connections: config.connection_limit,
            max_qps: config.qps_limit,
        }
    }
}

/// Hook of the limiter subsystem, registered once the limiter is built.
#[cfg_attr(test, automock)]
pub trait LimitUpdater: Send + Sync + 'static {
    /// Apply new limits; `false` when they did not take effect.
    fn update_limit(
        &self,
        values: &LimitValues,
    ) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitState {
    Uninitialized,
    ConfigOnly,
    UpdaterOnly,
    Ready,
}

/// Outcome of a config push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitApply {
    Applied,
    /// Updater reported the values did not take effect
    Rejected,
    /// No updater yet; values are replayed when it registers
    Deferred,
}

#[derive(Default)]
struct Binding {
    received: bool,
    updater: Option<Arc<dyn LimitUpdater>>,
}

/// Connection and QPS limits with a late-bound updater.
///
/// Config pushes and updater registration may arrive in either order. Once
/// both exist the updater has seen the latest values, and it sees every
/// later push. The updater runs under the binding lock so two pushes can
/// never reach it out of order; it must not call back into this option.
pub struct RateLimitOption {
    current: ArcSwap<LimitValues>,
    binding: Mutex<Binding>,
}

impl std::fmt::Debug for RateLimitOption {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RateLimitOption")
            .field("current", &self.snapshot())
            .field("state", &self.state())
            .finish()
    }
}

impl Default for RateLimitOption {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitOption {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(LimitValues::default()),
            binding: Mutex::new(Binding::default()),
        }
    }

    /// Lock-free read of the latest limits.
    pub fn snapshot(&self) -> LimitValues {
        **self.current.load()
    }

    pub fn update_limit_config(
        &self,
        values: LimitValues,
    ) -> LimitApply {
        let mut binding = self.binding.lock();
        self.current.store(Arc::new(values));
        binding.received = true;
        match &binding.updater {
            Some(updater) if updater.update_limit(&values) => LimitApply::Applied,
            Some(_) => LimitApply::Rejected,
            None => {
                debug!(?values, "limiter not registered yet, deferring limits");
                LimitApply::Deferred
            }
        }
    }

    /// Attach the limiter; replays the stored limits if a push already came.
    pub fn register_updater(
        &self,
        updater: Arc<dyn LimitUpdater>,
    ) -> LimitApply {
        let mut binding = self.binding.lock();
        binding.updater = Some(updater.clone());
        if !binding.received {
            return LimitApply::Deferred;
        }
        let values = self.snapshot();
        debug!(?values, "replaying limits to newly registered limiter");
        if updater.update_limit(&values) {
            LimitApply::Applied
        } else {
            LimitApply::Rejected
        }
    }

    pub fn state(&self) -> RateLimitState {
        let binding = self.binding.lock();
        match (binding.received, binding.updater.is_some()) {
            (false, false) => RateLimitState::Uninitialized,
            (true, false) => RateLimitState::ConfigOnly,
            (false, true) => RateLimitState::UpdaterOnly,
            (true, true) => RateLimitState::Ready,
        }
    }
}
