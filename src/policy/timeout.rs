use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::WILDCARD_METHOD;

/// Timeouts of one method; zero means "not set, use the framework's own".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RpcTimeout {
    #[serde(default)]
    pub rpc_timeout_ms: u64,
    #[serde(default)]
    pub conn_timeout_ms: u64,
}

impl RpcTimeout {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.conn_timeout_ms)
    }
}

/// Per-method RPC timeouts.
///
/// A push replaces the whole map at once, so methods missing from the new
/// snapshot fall back without any reconciliation.
#[derive(Debug, Default)]
pub struct TimeoutContainer {
    configs: ArcSwap<HashMap<String, RpcTimeout>>,
}

impl TimeoutContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_policy_change(
        &self,
        configs: HashMap<String, RpcTimeout>,
    ) {
        self.configs.store(Arc::new(configs));
    }

    /// Exact match, else wildcard, else zero timeouts.
    pub fn timeouts(
        &self,
        method: &str,
    ) -> RpcTimeout {
        let configs = self.configs.load();
        if let Some(config) = configs.get(method) {
            trace!(method, ?config, "found rpc timeout");
            return *config;
        }
        if let Some(config) = configs.get(WILDCARD_METHOD) {
            trace!(method, ?config, "using wildcard rpc timeout");
            return *config;
        }
        RpcTimeout::default()
    }
}
