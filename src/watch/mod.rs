//! Policy subscription multiplexing
//!
//! A process usually builds several governed clients and servers, and more
//! than one of them may read the same dataset (two clients calling the same
//! destination, for instance). The [`WatchMultiplexer`] keeps exactly one
//! upstream store watch per [`SubscriptionKey`](crate::SubscriptionKey)
//! while any subscriber for it exists, and reference counts the subscribers:
//!
//! - first `register` for a key: fetch, deliver, then `store.watch`
//! - later `register` for the key: fetch and deliver to the newcomer only
//! - every upstream push: delivered once to every current subscriber
//! - last `deregister` for the key: `store.cancel_watch`
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use govern_sync::{MemoryConfigStore, SubscriptionKey, WatchMultiplexer};
//!
//! let store = Arc::new(MemoryConfigStore::new());
//! let multiplexer = WatchMultiplexer::new(store.clone());
//! let key = SubscriptionKey::new("echo.retry", "DEFAULT_GROUP");
//!
//! let subscription = multiplexer.subscribe(
//!     key.clone(),
//!     Arc::new(|payload: &str| println!("policy payload: {payload}")),
//! )?;
//!
//! store.publish(&key, r#"{"*": {"enable": true}}"#);
//! subscription.close()?;
//! ```

mod multiplexer;


pub use multiplexer::*;
