//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the circuit-breaker proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Circuit breaker thresholds and host registry sizing.
    pub breaker: BreakerSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8085").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8085".to_string(),
        }
    }
}

/// Circuit breaker configuration.
///
/// The top-level fields are the `"default"` policy. Entries under `hosts`
/// override individual fields for a single host identifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Hold rejected requests for 80% of the client's `Request-Timeout`.
    pub long_polling: bool,

    /// Failures that trip a closed breaker open.
    pub max_failed_tries: u32,

    /// How long a tripped breaker stays open before probing, in milliseconds.
    pub open_state_expiry_ms: u64,

    /// Maximum number of hosts tracked at once (LRU beyond that).
    pub host_capacity: usize,

    /// Number of independently locked registry shards.
    pub registry_shards: usize,

    /// Per-host overrides keyed by host identifier (`hostname[:port]`).
    pub hosts: HashMap<String, HostOverride>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            long_polling: false,
            max_failed_tries: 3,
            open_state_expiry_ms: 35_000,
            host_capacity: 100,
            registry_shards: 8,
            hosts: HashMap::new(),
        }
    }
}

/// Partial breaker settings for one host. Unset fields inherit the default.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HostOverride {
    pub long_polling: Option<bool>,
    pub max_failed_tries: Option<u32>,
    pub open_state_expiry_ms: Option<u64>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total lifetime of an inbound request (including long-polling holds) in seconds.
    pub request_secs: u64,

    /// Total time allowed for one upstream call in seconds.
    pub upstream_secs: u64,

    /// Idle pooled upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
            upstream_secs: 30,
            idle_secs: 90,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8086".to_string(),
        }
    }
}
