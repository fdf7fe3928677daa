//! # govern-sync
//!
//! Hot-update core for RPC governance policies kept in a configuration
//! store: retry, circuit breaker, RPC timeout, rate limit and degradation.
//!
//! ## Layers
//! - [`ConfigStore`]: capability of the store client (get, watch, cancel)
//! - [`WatchMultiplexer`]: one upstream watch per key, fanned out to many
//!   subscribers
//! - [`MethodSetReconciler`]: reverts methods dropped from a snapshot
//! - policy containers read on every request ([`RetryContainer`],
//!   [`CircuitBreakerContainer`], [`TimeoutContainer`], [`RateLimitOption`],
//!   [`DegradationSampler`])
//! - [`ClientSuite`] / [`ServerSuite`]: wire the containers to the store
//!
//! ## Quick Start
//! ```ignore
//! use std::sync::Arc;
//! use govern_sync::*;
//!
//! let store = Arc::new(MemoryConfigStore::new());
//! let multiplexer = WatchMultiplexer::new(store.clone());
//! let config = GovernConfig::new()?.validate()?;
//!
//! let policies = ClientSuite::new("echo", "frontend", multiplexer, config).build()?;
//! if policies.degradation.decide(&request).is_reject() {
//!     return Err(DegradationRejected.into());
//! }
//! let timeouts = policies.rpc_timeout.timeouts("Echo");
//! ```

mod config;
mod constants;
mod decode;
mod errors;
mod govern;
mod policy;
mod reconcile;
mod store;
mod watch;

pub use config::*;
pub use constants::*;
pub use decode::*;
pub use errors::*;
pub use govern::*;
pub use policy::*;
pub use reconcile::*;
pub use store::*;
pub use watch::*;
