use std::sync::Arc;

use super::apply_customizers;
use super::watch_policy;
use super::Governed;
use super::KeyCustomizer;
use super::KeyParams;
use crate::apply_limiter_config;
use crate::Decoder;
use crate::GovernConfig;
use crate::LimiterConfig;
use crate::RateLimitOption;
use crate::Result;
use crate::SerdeDecoder;
use crate::SubscriptionKey;
use crate::WatchMultiplexer;
use crate::LIMITER_CATEGORY;

/// Builds the governed policies of one server.
///
/// Decoding works as for [`crate::ClientSuite`].
pub struct ServerSuite<D = SerdeDecoder> {
    service: String,
    multiplexer: WatchMultiplexer,
    config: GovernConfig,
    customizers: Vec<KeyCustomizer>,
    decoder: Arc<D>,
}

impl<D> Clone for ServerSuite<D> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            multiplexer: self.multiplexer.clone(),
            config: self.config.clone(),
            customizers: self.customizers.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for ServerSuite<D> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ServerSuite")
            .field("service", &self.service)
            .field("customizers", &self.customizers.len())
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl ServerSuite {
    pub fn new(
        service: impl Into<String>,
        multiplexer: WatchMultiplexer,
        config: GovernConfig,
    ) -> Self {
        let decoder = Arc::new(SerdeDecoder::new(config.format));
        Self {
            service: service.into(),
            multiplexer,
            config,
            customizers: Vec::new(),
            decoder,
        }
    }
}

impl<D> ServerSuite<D>
where
    D: Send + Sync + 'static,
{
    pub fn with_decoder<E>(
        self,
        decoder: E,
    ) -> ServerSuite<E> {
        ServerSuite {
            service: self.service,
            multiplexer: self.multiplexer,
            config: self.config,
            customizers: self.customizers,
            decoder: Arc::new(decoder),
        }
    }

    pub fn with_key_customizer(
        mut self,
        customizer: impl Fn(&mut SubscriptionKey) + Send + Sync + 'static,
    ) -> Self {
        self.customizers.push(Arc::new(customizer));
        self
    }

    pub fn key_for(
        &self,
        category: &str,
    ) -> Result<SubscriptionKey> {
        let params = KeyParams {
            category: category.to_string(),
            client_service: String::new(),
            server_service: self.service.clone(),
        };
        let mut key = self.config.keys.server_key(&params)?;
        apply_customizers(&mut key, &self.customizers);
        Ok(key)
    }

    /// Connection and QPS limits. The limiter attaches itself later through
    /// [`RateLimitOption::register_updater`].
    pub fn limiter(&self) -> Result<Governed<RateLimitOption>>
    where
        D: Decoder<LimiterConfig>,
    {
        watch_policy(
            &self.multiplexer,
            self.key_for(LIMITER_CATEGORY)?,
            self.decoder.clone(),
            LIMITER_CATEGORY,
            Arc::new(RateLimitOption::new()),
            |option: &RateLimitOption, config: LimiterConfig| apply_limiter_config(option, config),
        )
    }
}
