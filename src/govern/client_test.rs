use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing_test::traced_test;

use super::*;
use crate::service_cb_key;
use crate::CbConfig;
use crate::DecodeError;
use crate::Decoder;
use crate::ConfigFormat;
use crate::Decision;
use crate::GovernConfig;
use crate::MemoryConfigStore;
use crate::MockConfigStore;
use crate::RpcTimeout;
use crate::StoreError;
use crate::SubscriptionKey;
use crate::WatchMultiplexer;

fn setup() -> (Arc<MemoryConfigStore>, ClientSuite) {
    let store = Arc::new(MemoryConfigStore::new());
    let suite = ClientSuite::new(
        "echo",
        "frontend",
        WatchMultiplexer::new(store.clone()),
        GovernConfig::default(),
    );
    (store, suite)
}

fn key(dataset: &str) -> SubscriptionKey {
    SubscriptionKey::new(dataset, "DEFAULT_GROUP")
}

#[test]
fn keys_follow_client_template() {
    let (_, suite) = setup();
    assert_eq!(suite.key_for("retry").unwrap(), key("frontend.echo.retry"));
}

#[test]
fn key_customizers_run_in_order() {
    let (_, suite) = setup();
    let suite = suite
        .with_key_customizer(|key| key.group = "TENANT_A".to_string())
        .with_key_customizer(|key| key.dataset.push_str(".v2"));

    assert_eq!(
        suite.key_for("limit").unwrap(),
        SubscriptionKey::new("frontend.echo.limit.v2", "TENANT_A")
    );
}

#[test]
fn retry_policy_initialises_from_store_and_follows_pushes() {
    let (store, suite) = setup();
    store.publish(
        &key("frontend.echo.retry"),
        r#"{"Echo": {"enable": true, "failure_policy": {"stop_policy": {"max_retry_times": 3}}}}"#,
    );

    let retry = suite.retry_policy().unwrap();
    assert!(retry.policy_for("Echo").enable);

    store.publish(&key("frontend.echo.retry"), "{}");
    assert!(!retry.policy_for("Echo").enable);
    assert!(!retry.has_explicit_policy("Echo"));
}

#[test]
fn circuit_breaker_keys_carry_caller_identity() {
    let (store, suite) = setup();
    store.publish(
        &key("frontend.echo.circuit_break"),
        r#"{"Echo": {"enable": true, "err_rate": 0.2, "min_sample": 10}}"#,
    );

    let cb = suite.circuit_breaker().unwrap();
    let cb_key = service_cb_key("frontend", "echo", "Echo");
    assert_eq!(cb.config_for(&cb_key).min_sample, 10);

    store.publish(&key("frontend.echo.circuit_break"), "{}");
    assert!(cb.contains_key(&cb_key));
    assert_eq!(cb.config_for(&cb_key), CbConfig::default());
}

#[test]
#[traced_test]
fn undecodable_push_keeps_previous_policy() {
    let (store, suite) = setup();
    store.publish(&key("frontend.echo.degradation"), r#"{"enable": true, "percentage": 100}"#);
    let degradation = suite.degradation().unwrap();
    assert_eq!(degradation.decide("req"), Decision::Reject);

    store.publish(&key("frontend.echo.degradation"), "{not json");

    assert_eq!(degradation.decide("req"), Decision::Reject);
    assert!(logs_contain("keeping previous policy"));
}

#[test]
fn yaml_payloads_are_decoded_when_configured() {
    let store = Arc::new(MemoryConfigStore::new());
    let config = GovernConfig {
        format: ConfigFormat::Yaml,
        ..Default::default()
    };
    let suite = ClientSuite::new("echo", "frontend", WatchMultiplexer::new(store.clone()), config);
    store.publish(&key("frontend.echo.rpc_timeout"), "Echo:\n  rpc_timeout_ms: 800\n");

    let timeouts = suite.rpc_timeout().unwrap();
    assert_eq!(timeouts.timeouts("Echo").rpc_timeout_ms, 800);
}

#[test]
fn build_subscribes_all_and_close_releases_watches() {
    let (store, suite) = setup();
    let policies = suite.build().unwrap();

    for category in ["retry", "circuit_break", "rpc_timeout", "degradation"] {
        assert!(store.is_watched(&key(&format!("frontend.echo.{category}"))));
    }

    policies.close().unwrap();
    assert_eq!(store.cancel_calls(), 4);
    assert_eq!(store.watch_calls(), 4);
}

#[test]
fn two_clients_share_one_upstream_watch() {
    let store = Arc::new(MemoryConfigStore::new());
    let multiplexer = WatchMultiplexer::new(store.clone());
    let first = ClientSuite::new("echo", "frontend", multiplexer.clone(), GovernConfig::default());
    let second = ClientSuite::new("echo", "frontend", multiplexer.clone(), GovernConfig::default());

    let a = first.rpc_timeout().unwrap();
    let b = second.rpc_timeout().unwrap();
    assert_eq!(store.watch_calls(), 1);
    assert_eq!(multiplexer.watcher_count(&key("frontend.echo.rpc_timeout")), 2);

    store.publish(&key("frontend.echo.rpc_timeout"), r#"{"*": {"rpc_timeout_ms": 100}}"#);
    assert_eq!(a.timeouts("Echo").rpc_timeout_ms, 100);
    assert_eq!(b.timeouts("Echo").rpc_timeout_ms, 100);

    a.close().unwrap();
    assert_eq!(store.cancel_calls(), 0);
    b.close().unwrap();
    assert_eq!(store.cancel_calls(), 1);
}

#[test]
fn failed_build_drops_earlier_subscriptions() {
    let mut store = MockConfigStore::new();
    store.expect_get().returning(|_| Ok(None));
    let watches = AtomicUsize::new(0);
    store.expect_watch().times(2).returning(move |key, _| {
        if watches.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(());
        }
        Err(StoreError::WatchFailed {
            key: key.clone(),
            reason: "refused".to_string(),
        }
        .into())
    });
    store.expect_cancel_watch().times(1).returning(|_| Ok(()));

    let multiplexer = WatchMultiplexer::new(Arc::new(store));
    let suite = ClientSuite::new("echo", "frontend", multiplexer.clone(), GovernConfig::default());

    assert!(suite.build().is_err());
    assert_eq!(multiplexer.watched_key_count(), 0);
}

/// `method=rpc_ms` per line
#[derive(Debug)]
struct LineTimeoutDecoder;

impl Decoder<HashMap<String, RpcTimeout>> for LineTimeoutDecoder {
    fn decode(
        &self,
        payload: &str,
    ) -> std::result::Result<HashMap<String, RpcTimeout>, DecodeError> {
        payload
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| -> std::result::Result<(String, RpcTimeout), DecodeError> {
                let (method, ms) = line
                    .split_once('=')
                    .ok_or_else(|| DecodeError::Malformed(line.to_string()))?;
                let rpc_timeout_ms = ms
                    .trim()
                    .parse()
                    .map_err(|_| DecodeError::Malformed(line.to_string()))?;
                Ok((
                    method.trim().to_string(),
                    RpcTimeout {
                        rpc_timeout_ms,
                        conn_timeout_ms: 0,
                    },
                ))
            })
            .collect()
    }
}

#[test]
#[traced_test]
fn custom_decoder_parses_pushed_payloads() {
    let (store, suite) = setup();
    let suite = suite.with_decoder(LineTimeoutDecoder);
    store.publish(&key("frontend.echo.rpc_timeout"), "Echo=300\n*=900\n");

    let timeouts = suite.rpc_timeout().unwrap();
    assert_eq!(timeouts.timeouts("Echo").rpc_timeout_ms, 300);
    assert_eq!(timeouts.timeouts("Ping").rpc_timeout_ms, 900);

    store.publish(&key("frontend.echo.rpc_timeout"), "Echo=150\n");
    assert_eq!(timeouts.timeouts("Echo").rpc_timeout_ms, 150);
    assert_eq!(timeouts.timeouts("Ping").rpc_timeout_ms, 0);

    store.publish(&key("frontend.echo.rpc_timeout"), "Echo=fast\n");
    assert_eq!(timeouts.timeouts("Echo").rpc_timeout_ms, 150);
    assert!(logs_contain("Malformed payload"));
}
