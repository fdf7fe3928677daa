// -
// Method matching

/// Fallback policy entry matched when no exact method is configured
pub const WILDCARD_METHOD: &str = "*";

// -
// Policy categories, rendered into data ids

pub const RETRY_CATEGORY: &str = "retry";
pub const CIRCUIT_BREAKER_CATEGORY: &str = "circuit_break";
pub const RPC_TIMEOUT_CATEGORY: &str = "rpc_timeout";
pub const LIMITER_CATEGORY: &str = "limit";
pub const DEGRADATION_CATEGORY: &str = "degradation";

// -
// Key layout defaults

pub(crate) const DEFAULT_CONFIG_GROUP: &str = "DEFAULT_GROUP";
pub(crate) const DEFAULT_SERVER_DATA_ID_FORMAT: &str = "{{.ServerServiceName}}.{{.Category}}";
pub(crate) const DEFAULT_CLIENT_DATA_ID_FORMAT: &str =
    "{{.ClientServiceName}}.{{.ServerServiceName}}.{{.Category}}";

/// Environment variable prefix for settings overrides (`GOVERN__KEYS__GROUP=...`)
pub(crate) const ENV_PREFIX: &str = "GOVERN";
pub(crate) const ENV_CONFIG_PATH: &str = "CONFIG_PATH";
