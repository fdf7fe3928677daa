//! Governance Policy Synchronization Error Hierarchy
//!
//! Defines the error types surfaced by the policy synchronization core,
//! categorized by the layer that produced them.
//!
//! Only setup-time failures (initial fetch, watch establishment, cancel)
//! reach callers. Decode and validation failures during steady-state
//! snapshot application are logged and the previous policy is kept.

use config::ConfigError;

use crate::SubscriptionKey;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration store transport failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed policy payloads
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Policy values rejected by validation
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Settings loading and key template failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store is unreachable or refused the request
    #[error("Config store unavailable: {0}")]
    Unavailable(String),

    /// Upstream watch could not be established
    #[error("Failed to watch {key}: {reason}")]
    WatchFailed { key: SubscriptionKey, reason: String },

    /// Upstream watch could not be cancelled
    #[error("Failed to cancel watch on {key}: {reason}")]
    CancelFailed { key: SubscriptionKey, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML decode failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Rejected by a custom decoder
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Both backup and failure sub-policies were given
    #[error("Retry policy for method {method}: backup_policy and failure_policy must not be set at the same time")]
    RetryPolicyConflict { method: String },

    /// Neither backup nor failure sub-policy was given
    #[error("Retry policy for method {method}: backup_policy and failure_policy must not both be empty")]
    RetryPolicyEmpty { method: String },
}

/// Returned by the degradation ACL hook when a request is sampled out
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rejected by client degradation config")]
pub struct DegradationRejected;
