//! End-to-end policy flows through the in-memory store.

use std::sync::Arc;

use govern_sync::service_cb_key;
use govern_sync::CbConfig;
use govern_sync::ClientSuite;
use govern_sync::Decision;
use govern_sync::DegradationRejected;
use govern_sync::LimitUpdater;
use govern_sync::LimitValues;
use govern_sync::ServerSuite;
use parking_lot::Mutex;

use crate::common::Harness;
use crate::common::CLIENT;
use crate::common::SERVER;

#[derive(Default)]
struct Limiter {
    applied: Mutex<Vec<LimitValues>>,
}

impl LimitUpdater for Limiter {
    fn update_limit(
        &self,
        values: &LimitValues,
    ) -> bool {
        self.applied.lock().push(*values);
        true
    }
}

#[test]
fn client_policies_follow_store_changes() {
    let h = Harness::new();
    h.store.publish(
        &h.client_key("retry"),
        r#"{
            "*": {"enable": true, "type": "failure", "failure_policy": {"stop_policy": {"max_retry_times": 1}}},
            "Echo": {"enable": true, "type": "backup", "backup_policy": {"retry_delay_ms": 30}}
        }"#,
    );
    h.store.publish(&h.client_key("rpc_timeout"), r#"{"Echo": {"rpc_timeout_ms": 250}}"#);

    let policies = ClientSuite::new(SERVER, CLIENT, h.multiplexer.clone(), h.config.clone())
        .build()
        .unwrap();

    assert_eq!(
        policies.retry.policy_for("Echo").backup_policy.as_ref().map(|b| b.retry_delay_ms),
        Some(30)
    );
    assert!(policies.retry.policy_for("Ping").failure_policy.is_some());
    assert_eq!(policies.rpc_timeout.timeouts("Echo").rpc_timeout_ms, 250);
    assert_eq!(policies.degradation.decide("req"), Decision::Allow);

    // Echo disappears: falls back to the wildcard
    h.store.publish(
        &h.client_key("retry"),
        r#"{"*": {"enable": true, "failure_policy": {"stop_policy": {"max_retry_times": 1}}}}"#,
    );
    assert!(policies.retry.policy_for("Echo").backup_policy.is_none());
    assert!(policies.retry.policy_for("Echo").failure_policy.is_some());

    h.store.publish(&h.client_key("degradation"), r#"{"enable": true, "percentage": 100}"#);
    assert_eq!(policies.degradation.decide("req").into_result(), Err(DegradationRejected));

    policies.close().unwrap();
    assert_eq!(h.multiplexer.watched_key_count(), 0);
}

#[test]
fn circuit_breaker_reset_survives_key_deletion() {
    let h = Harness::new();
    h.store.publish(
        &h.client_key("circuit_break"),
        r#"{"Echo": {"enable": false, "err_rate": 0.9, "min_sample": 5}}"#,
    );
    let cb = ClientSuite::new(SERVER, CLIENT, h.multiplexer.clone(), h.config.clone())
        .circuit_breaker()
        .unwrap();
    let key = service_cb_key(CLIENT, SERVER, "Echo");
    assert!(!cb.config_for(&key).enable);

    // Deleting the dataset delivers an empty payload, i.e. an empty snapshot
    h.store.remove(&h.client_key("circuit_break"));

    assert!(cb.contains_key(&key));
    assert_eq!(cb.config_for(&key), CbConfig::default());
}

#[test]
fn limiter_converges_regardless_of_arrival_order() {
    let config_first = Harness::new();
    config_first
        .store
        .publish(&config_first.server_key("limit"), r#"{"connection_limit": 8, "qps_limit": 80}"#);
    let early = ServerSuite::new(SERVER, config_first.multiplexer.clone(), config_first.config.clone())
        .limiter()
        .unwrap();
    let early_limiter = Arc::new(Limiter::default());
    early.register_updater(early_limiter.clone());

    let updater_first = Harness::new();
    let late = ServerSuite::new(SERVER, updater_first.multiplexer.clone(), updater_first.config.clone())
        .limiter()
        .unwrap();
    let late_limiter = Arc::new(Limiter::default());
    late.register_updater(late_limiter.clone());
    updater_first
        .store
        .publish(&updater_first.server_key("limit"), r#"{"connection_limit": 8, "qps_limit": 80}"#);

    let expected = LimitValues {
        max_connections: 8,
        max_qps: 80,
    };
    assert_eq!(early.snapshot(), expected);
    assert_eq!(late.snapshot(), expected);
    assert_eq!(early_limiter.applied.lock().last(), Some(&expected));
    assert_eq!(late_limiter.applied.lock().last(), Some(&expected));
}

#[test]
fn closed_policy_keeps_last_value_and_stops_updating() {
    let h = Harness::new();
    h.store.publish(&h.client_key("rpc_timeout"), r#"{"*": {"rpc_timeout_ms": 100}}"#);
    let governed = ClientSuite::new(SERVER, CLIENT, h.multiplexer.clone(), h.config.clone())
        .rpc_timeout()
        .unwrap();
    let container = governed.container().clone();

    governed.close().unwrap();
    h.store.publish(&h.client_key("rpc_timeout"), r#"{"*": {"rpc_timeout_ms": 900}}"#);

    assert_eq!(container.timeouts("Echo").rpc_timeout_ms, 100);
    assert!(!h.store.is_watched(&h.client_key("rpc_timeout")));
}
