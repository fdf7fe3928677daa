use std::collections::HashMap;
use std::sync::Arc;

use super::apply_customizers;
use super::watch_policy;
use super::Governed;
use super::KeyCustomizer;
use super::KeyParams;
use crate::apply_circuit_breaker_snapshot;
use crate::apply_degradation_config;
use crate::apply_retry_snapshot;
use crate::apply_timeout_snapshot;
use crate::CbConfig;
use crate::CircuitBreakerContainer;
use crate::Decoder;
use crate::DegradationConfig;
use crate::DegradationSampler;
use crate::GovernConfig;
use crate::MethodSetReconciler;
use crate::Result;
use crate::RetryContainer;
use crate::RetryPolicy;
use crate::RpcTimeout;
use crate::SerdeDecoder;
use crate::SubscriptionKey;
use crate::TimeoutContainer;
use crate::WatchMultiplexer;
use crate::CIRCUIT_BREAKER_CATEGORY;
use crate::DEGRADATION_CATEGORY;
use crate::RETRY_CATEGORY;
use crate::RPC_TIMEOUT_CATEGORY;

/// Builds the governed policies of one client calling `dest_service`.
///
/// Payloads are decoded by `D`, [`SerdeDecoder`] in the configured format
/// unless replaced through [`ClientSuite::with_decoder`]. A policy kind is
/// only available when `D` can decode its snapshot shape.
///
/// ```ignore
/// let policies = ClientSuite::new("echo", "frontend", multiplexer, config).build()?;
/// let retry = policies.retry.policy_for("Echo");
/// ```
pub struct ClientSuite<D = SerdeDecoder> {
    dest_service: String,
    src_service: String,
    multiplexer: WatchMultiplexer,
    config: GovernConfig,
    customizers: Vec<KeyCustomizer>,
    decoder: Arc<D>,
}

impl<D> Clone for ClientSuite<D> {
    fn clone(&self) -> Self {
        Self {
            dest_service: self.dest_service.clone(),
            src_service: self.src_service.clone(),
            multiplexer: self.multiplexer.clone(),
            config: self.config.clone(),
            customizers: self.customizers.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for ClientSuite<D> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientSuite")
            .field("dest_service", &self.dest_service)
            .field("src_service", &self.src_service)
            .field("customizers", &self.customizers.len())
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl ClientSuite {
    pub fn new(
        dest_service: impl Into<String>,
        src_service: impl Into<String>,
        multiplexer: WatchMultiplexer,
        config: GovernConfig,
    ) -> Self {
        let decoder = Arc::new(SerdeDecoder::new(config.format));
        Self {
            dest_service: dest_service.into(),
            src_service: src_service.into(),
            multiplexer,
            config,
            customizers: Vec::new(),
            decoder,
        }
    }
}

impl<D> ClientSuite<D>
where
    D: Send + Sync + 'static,
{
    /// Replace the payload decoder for every policy kind of this client.
    pub fn with_decoder<E>(
        self,
        decoder: E,
    ) -> ClientSuite<E> {
        ClientSuite {
            dest_service: self.dest_service,
            src_service: self.src_service,
            multiplexer: self.multiplexer,
            config: self.config,
            customizers: self.customizers,
            decoder: Arc::new(decoder),
        }
    }

    /// Customizers run in insertion order after template rendering.
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
            client_service: self.src_service.clone(),
            server_service: self.dest_service.clone(),
        };
        let mut key = self.config.keys.client_key(&params)?;
        apply_customizers(&mut key, &self.customizers);
        Ok(key)
    }

    pub fn retry_policy(&self) -> Result<Governed<RetryContainer>>
    where
        D: Decoder<HashMap<String, RetryPolicy>>,
    {
        let reconciler = MethodSetReconciler::new();
        watch_policy(
            &self.multiplexer,
            self.key_for(RETRY_CATEGORY)?,
            self.decoder.clone(),
            RETRY_CATEGORY,
            Arc::new(RetryContainer::new()),
            move |container: &RetryContainer, snapshot: HashMap<String, RetryPolicy>| {
                apply_retry_snapshot(container, &reconciler, snapshot)
            },
        )
    }

    /// Circuit keys are `src/dest/method`, see [`crate::service_cb_key`].
    pub fn circuit_breaker(&self) -> Result<Governed<CircuitBreakerContainer>>
    where
        D: Decoder<HashMap<String, CbConfig>>,
    {
        let reconciler = MethodSetReconciler::new();
        let from_service = self.src_service.clone();
        let to_service = self.dest_service.clone();
        watch_policy(
            &self.multiplexer,
            self.key_for(CIRCUIT_BREAKER_CATEGORY)?,
            self.decoder.clone(),
            CIRCUIT_BREAKER_CATEGORY,
            Arc::new(CircuitBreakerContainer::new()),
            move |container: &CircuitBreakerContainer, snapshot: HashMap<String, CbConfig>| {
                apply_circuit_breaker_snapshot(
                    container,
                    &reconciler,
                    &from_service,
                    &to_service,
                    snapshot,
                )
            },
        )
    }

    pub fn rpc_timeout(&self) -> Result<Governed<TimeoutContainer>>
    where
        D: Decoder<HashMap<String, RpcTimeout>>,
    {
        watch_policy(
            &self.multiplexer,
            self.key_for(RPC_TIMEOUT_CATEGORY)?,
            self.decoder.clone(),
            RPC_TIMEOUT_CATEGORY,
            Arc::new(TimeoutContainer::new()),
            |container: &TimeoutContainer, snapshot: HashMap<String, RpcTimeout>| {
                apply_timeout_snapshot(container, snapshot)
            },
        )
    }

    pub fn degradation(&self) -> Result<Governed<DegradationSampler>>
    where
        D: Decoder<DegradationConfig>,
    {
        watch_policy(
            &self.multiplexer,
            self.key_for(DEGRADATION_CATEGORY)?,
            self.decoder.clone(),
            DEGRADATION_CATEGORY,
            Arc::new(DegradationSampler::new()),
            |sampler: &DegradationSampler, config: DegradationConfig| {
                apply_degradation_config(sampler, config)
            },
        )
    }

    /// Subscribes every client policy. On failure, the policies already
    /// subscribed are dropped and thereby unsubscribed.
    pub fn build(&self) -> Result<ClientPolicies>
    where
        D: Decoder<HashMap<String, RetryPolicy>>
            + Decoder<HashMap<String, CbConfig>>
            + Decoder<HashMap<String, RpcTimeout>>
            + Decoder<DegradationConfig>,
    {
        Ok(ClientPolicies {
            retry: self.retry_policy()?,
            circuit_breaker: self.circuit_breaker()?,
            rpc_timeout: self.rpc_timeout()?,
            degradation: self.degradation()?,
        })
    }
}

#[derive(Debug)]
pub struct ClientPolicies {
    pub retry: Governed<RetryContainer>,
    pub circuit_breaker: Governed<CircuitBreakerContainer>,
    pub rpc_timeout: Governed<TimeoutContainer>,
    pub degradation: Governed<DegradationSampler>,
}

impl ClientPolicies {
    /// Closes every subscription and returns the first failure.
    pub fn close(self) -> Result<()> {
        let results = [
            self.retry.close(),
            self.circuit_breaker.close(),
            self.rpc_timeout.close(),
            self.degradation.close(),
        ];
        results.into_iter().fold(Ok(()), |first, next| first.and(next))
    }
}
