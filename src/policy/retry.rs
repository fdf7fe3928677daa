use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use tracing::debug;

use crate::PolicyError;
use crate::WILDCARD_METHOD;

/// Retry flavour; decodes from `"failure"`/`"backup"` or the numeric
/// codes `0`/`1` used by RPC framework policy payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryType {
    #[default]
    Failure,
    Backup,
}

impl<'de> Deserialize<'de> for RetryType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Debug, Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Code(u64),
            Name(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Code(0) => Ok(RetryType::Failure),
            Wire::Code(1) => Ok(RetryType::Backup),
            Wire::Name(name) if name == "failure" => Ok(RetryType::Failure),
            Wire::Name(name) if name == "backup" => Ok(RetryType::Backup),
            other => Err(D::Error::custom(format!("unknown retry type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    #[default]
    None,
    Fixed,
    Random,
}

/// Circuit-breaker based stop condition for retries
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CbStopPolicy {
    #[serde(default)]
    pub error_rate: f64,
}

/// When to stop retrying
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StopPolicy {
    #[serde(default)]
    pub max_retry_times: u32,
    /// Total budget for all attempts (unit: milliseconds, 0 means unbounded)
    #[serde(default)]
    pub max_duration_ms: u32,
    #[serde(default)]
    pub disable_chain_stop: bool,
    /// Stop when the request deadline would be exceeded
    #[serde(default)]
    pub ddl_stop: bool,
    #[serde(default)]
    pub cb_policy: CbStopPolicy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default)]
    pub backoff_type: BackoffType,
    /// Type specific knobs, e.g. `fix_ms` or `min_ms`/`max_ms`
    #[serde(default)]
    pub cfg_items: HashMap<String, f64>,
}

/// Retry after a failed attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailurePolicy {
    #[serde(default)]
    pub stop_policy: StopPolicy,
    #[serde(default)]
    pub backoff_policy: Option<BackoffPolicy>,
    #[serde(default)]
    pub retry_same_node: bool,
}

/// Send a backup request when the first one is slow
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackupPolicy {
    /// Delay before the backup request (unit: milliseconds)
    #[serde(default)]
    pub retry_delay_ms: u32,
    #[serde(default)]
    pub stop_policy: StopPolicy,
    #[serde(default)]
    pub retry_same_node: bool,
}

/// Retry policy of one method
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub enable: bool,
    #[serde(default, rename = "type")]
    pub retry_type: RetryType,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default)]
    pub backup_policy: Option<BackupPolicy>,
}

impl RetryPolicy {
    /// Exactly one of `backup_policy` and `failure_policy` must be set.
    pub fn validate(
        &self,
        method: &str,
    ) -> Result<(), PolicyError> {
        match (&self.backup_policy, &self.failure_policy) {
            (Some(_), Some(_)) => Err(PolicyError::RetryPolicyConflict {
                method: method.to_string(),
            }),
            (None, None) => Err(PolicyError::RetryPolicyEmpty {
                method: method.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Per-method retry policies read on every call.
///
/// Lookups take a read lock for a single map probe; writers only come from
/// config pushes.
#[derive(Debug)]
pub struct RetryContainer {
    policies: RwLock<HashMap<String, Arc<RetryPolicy>>>,
    default_policy: Arc<RetryPolicy>,
}

impl Default for RetryContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryContainer {
    /// Empty container; every method resolves to the disabled default.
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
            default_policy: Arc::new(RetryPolicy::default()),
        }
    }

    /// Install `policy` for `method` after validation.
    ///
    /// A rejected policy leaves the previous entry for `method` untouched.
    pub fn notify_policy_change(
        &self,
        method: &str,
        policy: RetryPolicy,
    ) -> Result<(), PolicyError> {
        policy.validate(method)?;
        debug!(method, "retry policy updated");
        self.policies.write().insert(method.to_string(), Arc::new(policy));
        Ok(())
    }

    /// Drop the explicit entry; `method` falls back to `*` or the default.
    pub fn delete_policy(
        &self,
        method: &str,
    ) {
        if self.policies.write().remove(method).is_some() {
            debug!(method, "retry policy removed");
        }
    }

    /// Exact match, else wildcard, else the built-in default.
    pub fn policy_for(
        &self,
        method: &str,
    ) -> Arc<RetryPolicy> {
        let policies = self.policies.read();
        policies
            .get(method)
            .or_else(|| policies.get(WILDCARD_METHOD))
            .cloned()
            .unwrap_or_else(|| self.default_policy.clone())
    }

    pub fn has_explicit_policy(
        &self,
        method: &str,
    ) -> bool {
        self.policies.read().contains_key(method)
    }
}
