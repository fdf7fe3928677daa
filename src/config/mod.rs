//! Settings of the governance layer.
//!
//! Loaded from layered sources, later ones overriding earlier:
//! 1. Type defaults
//! 2. File named by `CONFIG_PATH` (if set)
//! 3. Environment variables with the `GOVERN__` prefix
mod keys;
pub use keys::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_CONFIG_PATH;
use crate::constants::ENV_PREFIX;
use crate::ConfigFormat;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GovernConfig {
    /// How data ids and groups are derived from service identities
    pub keys: KeyConfig,
    /// Format of stored policy payloads
    pub format: ConfigFormat,
}

impl GovernConfig {
    /// Loads settings from defaults, `CONFIG_PATH` and the environment.
    ///
    /// Does not validate; call [`GovernConfig::validate`] once all overrides
    /// are applied.
    ///
    /// ```ignore
    /// std::env::set_var("GOVERN__KEYS__GROUP", "gov");
    /// let config = GovernConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(ENV_CONFIG_PATH) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers `path` over the current values; environment still wins.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.keys.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
