//! Setup layer: wires policy containers to store subscriptions.
//!
//! A suite renders the store key of each policy category, subscribes it on
//! the shared [`WatchMultiplexer`], and returns the container together with
//! the subscription that keeps it updated. Every push is decoded, reconciled
//! and applied; a payload that fails to decode is logged and the container
//! keeps its previous policy.

mod apply;
mod client;
mod server;

pub use apply::*;
pub use client::*;
pub use server::*;

#[cfg(test)]
mod client_test;

use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::Decoder;
use crate::OnChange;
use crate::Result;
use crate::Subscription;
use crate::SubscriptionKey;
use crate::WatchMultiplexer;

/// Values substituted into key templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyParams {
    pub category: String,
    pub client_service: String,
    pub server_service: String,
}

/// Last-chance rewrite of a rendered key, e.g. to pin a group per tenant.
pub type KeyCustomizer = Arc<dyn Fn(&mut SubscriptionKey) + Send + Sync>;

/// A container kept in sync with the store.
///
/// Dropping it stops updates best-effort; [`Governed::close`] reports
/// cancellation failures.
#[derive(Debug)]
pub struct Governed<C> {
    container: Arc<C>,
    subscription: Subscription,
}

impl<C> Governed<C> {
    pub fn container(&self) -> &Arc<C> {
        &self.container
    }

    pub fn key(&self) -> &SubscriptionKey {
        self.subscription.key()
    }

    /// Stops updates. The container keeps its last applied policy.
    pub fn close(self) -> Result<()> {
        self.subscription.close()
    }
}

impl<C> Deref for Governed<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.container
    }
}

fn apply_customizers(
    key: &mut SubscriptionKey,
    customizers: &[KeyCustomizer],
) {
    for customize in customizers {
        customize(key);
    }
}

/// Subscribe `key` and route decoded snapshots of shape `T` into `apply`.
fn watch_policy<C, T, D, F>(
    multiplexer: &WatchMultiplexer,
    key: SubscriptionKey,
    decoder: Arc<D>,
    category: &'static str,
    container: Arc<C>,
    apply: F,
) -> Result<Governed<C>>
where
    C: Send + Sync + 'static,
    T: 'static,
    D: Decoder<T> + ?Sized + 'static,
    F: Fn(&C, T) + Send + Sync + 'static,
{
    let target = container.clone();
    let key_label = key.to_string();
    let on_change: OnChange = Arc::new(move |payload: &str| {
        match decoder.decode(payload) {
            Ok(snapshot) => apply(&target, snapshot),
            Err(e) => warn!(
                key = %key_label,
                category,
                "skipping policy push, keeping previous policy: {}",
                e
            ),
        }
    });

    debug!(%key, category, "subscribing policy");
    let subscription = multiplexer.subscribe(key, on_change)?;
    Ok(Governed {
        container,
        subscription,
    })
}
