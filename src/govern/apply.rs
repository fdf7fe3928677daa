use std::collections::HashMap;

use tracing::debug;
use tracing::warn;

use crate::service_cb_key;
use crate::CbConfig;
use crate::CircuitBreakerContainer;
use crate::DegradationConfig;
use crate::DegradationSampler;
use crate::LimitApply;
use crate::LimitValues;
use crate::LimiterConfig;
use crate::MethodSet;
use crate::MethodSetReconciler;
use crate::RateLimitOption;
use crate::RetryContainer;
use crate::RetryPolicy;
use crate::RpcTimeout;
use crate::TimeoutContainer;

/// Applies a full retry snapshot.
///
/// Invalid policies are skipped one by one. A skipped method still counts as
/// known, so it is deleted once a later snapshot drops it.
pub fn apply_retry_snapshot(
    container: &RetryContainer,
    reconciler: &MethodSetReconciler,
    snapshot: HashMap<String, RetryPolicy>,
) {
    let mut methods = MethodSet::new();
    for (method, policy) in snapshot {
        methods.insert(method.as_str());
        if let Err(e) = container.notify_policy_change(&method, policy) {
            warn!(%method, "skipping retry policy: {}", e);
        }
    }

    for method in reconciler.diff_and_replace(methods) {
        debug!(%method, "retry policy removed from snapshot");
        container.delete_policy(&method);
    }
}

/// Applies a full circuit breaker snapshot keyed by method.
///
/// Methods dropped from the snapshot are reset to the default config, never
/// removed.
pub fn apply_circuit_breaker_snapshot(
    container: &CircuitBreakerContainer,
    reconciler: &MethodSetReconciler,
    from_service: &str,
    to_service: &str,
    snapshot: HashMap<String, CbConfig>,
) {
    let mut methods = MethodSet::new();
    for (method, config) in snapshot {
        container.update_service_cb_config(&service_cb_key(from_service, to_service, &method), config);
        methods.insert(method);
    }

    for method in reconciler.diff_and_replace(methods) {
        debug!(%method, "circuit breaker config removed from snapshot");
        container.reset_to_default(&service_cb_key(from_service, to_service, &method));
    }
}

pub fn apply_timeout_snapshot(
    container: &TimeoutContainer,
    snapshot: HashMap<String, RpcTimeout>,
) {
    container.notify_policy_change(snapshot);
}

pub fn apply_limiter_config(
    option: &RateLimitOption,
    config: LimiterConfig,
) {
    let values = LimitValues::from(config);
    if option.update_limit_config(values) == LimitApply::Rejected {
        warn!(?values, "limiter did not apply the new limits");
    }
}

pub fn apply_degradation_config(
    sampler: &DegradationSampler,
    config: DegradationConfig,
) {
    sampler.notify_policy_change(config);
}
