use std::sync::Arc;

use govern_sync::GovernConfig;
use govern_sync::MemoryConfigStore;
use govern_sync::SubscriptionKey;
use govern_sync::WatchMultiplexer;

pub const CLIENT: &str = "frontend";
pub const SERVER: &str = "echo";

pub struct Harness {
    pub store: Arc<MemoryConfigStore>,
    pub multiplexer: WatchMultiplexer,
    pub config: GovernConfig,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryConfigStore::new());
        let multiplexer = WatchMultiplexer::new(store.clone());
        Self {
            store,
            multiplexer,
            config: GovernConfig::default(),
        }
    }

    pub fn client_key(
        &self,
        category: &str,
    ) -> SubscriptionKey {
        SubscriptionKey::new(format!("{CLIENT}.{SERVER}.{category}"), "DEFAULT_GROUP")
    }

    pub fn server_key(
        &self,
        category: &str,
    ) -> SubscriptionKey {
        SubscriptionKey::new(format!("{SERVER}.{category}"), "DEFAULT_GROUP")
    }
}
