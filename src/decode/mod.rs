//! Payload decoding for policy snapshots.
//!
//! The store hands over opaque strings. Each policy kind states the shape it
//! expects through [`Decoder<T>`]; reconciliation never sees the wire format.


use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::DecodeError;

/// Data format of a stored policy payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Json,
    Yaml,
}

/// Capability turning a raw payload into the policy shape `T`.
pub trait Decoder<T>: Send + Sync + Debug {
    fn decode(
        &self,
        payload: &str,
    ) -> Result<T, DecodeError>;
}

/// serde-backed decoder for JSON and YAML payloads.
///
/// An empty payload (key missing upstream, or deleted) decodes to
/// `T::default()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeDecoder {
    format: ConfigFormat,
}

impl SerdeDecoder {
    pub fn new(format: ConfigFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }
}

impl<T> Decoder<T> for SerdeDecoder
where
    T: DeserializeOwned + Default,
{
    fn decode(
        &self,
        payload: &str,
    ) -> Result<T, DecodeError> {
        if payload.trim().is_empty() {
            return Ok(T::default());
        }
        match self.format {
            ConfigFormat::Json => Ok(serde_json::from_str(payload)?),
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(payload)?),
        }
    }
}
