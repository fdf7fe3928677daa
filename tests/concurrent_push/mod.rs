//! Request-path reads racing config pushes.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use govern_sync::ClientSuite;

use crate::common::Harness;
use crate::common::CLIENT;
use crate::common::SERVER;

#[test]
fn readers_see_whole_snapshots_while_pushes_race() {
    let h = Harness::new();
    let policies = ClientSuite::new(SERVER, CLIENT, h.multiplexer.clone(), h.config.clone())
        .build()
        .unwrap();
    let timeouts = policies.rpc_timeout.container().clone();
    let sampler = policies.degradation.container().clone();
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let timeouts = timeouts.clone();
            let sampler = sampler.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let t = timeouts.timeouts("Echo");
                    // Both fields are always pushed together
                    assert_eq!(t.rpc_timeout_ms, t.conn_timeout_ms * 10);
                    let config = sampler.current();
                    assert!(config.percentage <= 100);
                }
            })
        })
        .collect();

    for i in 1..=200u64 {
        h.store.publish(
            &h.client_key("rpc_timeout"),
            format!(r#"{{"Echo": {{"rpc_timeout_ms": {}, "conn_timeout_ms": {}}}}}"#, i * 10, i),
        );
        h.store.publish(
            &h.client_key("degradation"),
            format!(r#"{{"enable": true, "percentage": {}}}"#, i % 150),
        );
    }
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(timeouts.timeouts("Echo").rpc_timeout_ms, 2000);
    policies.close().unwrap();
}
