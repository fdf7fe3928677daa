use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

/// Circuit breaker thresholds for one service/method key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CbConfig {
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// Error rate that opens the circuit (0.0 - 1.0)
    #[serde(default = "default_err_rate")]
    pub err_rate: f64,
    /// Samples required before the error rate is trusted
    #[serde(default = "default_min_sample")]
    pub min_sample: i64,
}

impl Default for CbConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            err_rate: default_err_rate(),
            min_sample: default_min_sample(),
        }
    }
}

fn default_enable() -> bool {
    true
}
fn default_err_rate() -> f64 {
    0.5
}
fn default_min_sample() -> i64 {
    200
}

/// Key of a service-level circuit: `from/to/method`.
///
/// Both snapshot application and per-request lookups must build keys here;
/// a mismatch silently disables circuit breaking for the method.
pub fn service_cb_key(
    from_service: &str,
    to_service: &str,
    method: &str,
) -> String {
    let mut key = String::with_capacity(from_service.len() + to_service.len() + method.len() + 2);
    key.push_str(from_service);
    key.push('/');
    key.push_str(to_service);
    key.push('/');
    key.push_str(method);
    key
}

/// Per-key circuit breaker configs.
///
/// Keys are never removed: a key that leaves the snapshot is reset to the
/// default config so an open circuit keeps its bookkeeping.
#[derive(Debug, Default)]
pub struct CircuitBreakerContainer {
    configs: DashMap<String, CbConfig>,
}

impl CircuitBreakerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_service_cb_config(
        &self,
        key: &str,
        config: CbConfig,
    ) {
        debug!(key, ?config, "circuit breaker config updated");
        self.configs.insert(key.to_string(), config);
    }

    pub fn reset_to_default(
        &self,
        key: &str,
    ) {
        self.update_service_cb_config(key, CbConfig::default());
    }

    /// Config for `key`, or the default when none was ever set.
    pub fn config_for(
        &self,
        key: &str,
    ) -> CbConfig {
        self.configs
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Read-path lookup for a call from `from_service` to `to_service`.
    ///
    /// Builds the key with [`service_cb_key`], as snapshot application does.
    pub fn config_for_call(
        &self,
        from_service: &str,
        to_service: &str,
        method: &str,
    ) -> CbConfig {
        self.config_for(&service_cb_key(from_service, to_service, method))
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.configs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
