use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::DegradationRejected;

const MAX_PERCENTAGE: u32 = 100;

/// Degradation policy; replaced as a whole, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DegradationConfig {
    #[serde(default)]
    pub enable: bool,
    /// Share of requests to reject, 0..=100
    #[serde(default)]
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject,
}

impl Decision {
    pub fn is_reject(self) -> bool {
        self == Decision::Reject
    }

    /// ACL-hook form of the decision.
    pub fn into_result(self) -> Result<(), DegradationRejected> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Reject => Err(DegradationRejected),
        }
    }
}

/// Probabilistic request shedding, consulted on every call.
///
/// Stateless between calls: each decision is an independent draw.
#[derive(Debug, Default)]
pub struct DegradationSampler {
    config: ArcSwap<DegradationConfig>,
}

impl DegradationSampler {
    /// Starts disabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_policy_change(
        &self,
        mut config: DegradationConfig,
    ) {
        if config.percentage > MAX_PERCENTAGE {
            warn!(
                percentage = config.percentage,
                "degradation percentage above {MAX_PERCENTAGE}, clamping"
            );
            config.percentage = MAX_PERCENTAGE;
        }
        self.config.store(Arc::new(config));
    }

    pub fn current(&self) -> DegradationConfig {
        **self.config.load()
    }

    /// Reject when enabled and a uniform draw in `[0, 100)` falls below
    /// the configured percentage.
    pub fn decide<R: ?Sized>(
        &self,
        _request: &R,
    ) -> Decision {
        let config = self.config.load();
        if !config.enable {
            return Decision::Allow;
        }
        if rand::thread_rng().gen_range(0..MAX_PERCENTAGE) < config.percentage {
            Decision::Reject
        } else {
            Decision::Allow
        }
    }
}
