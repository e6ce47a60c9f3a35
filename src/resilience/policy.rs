//! Per-host breaker configuration lookup.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{BreakerSettings, HostOverride};
use crate::resilience::circuit_breaker::BreakerConfig;

/// Key of the fallback entry in the per-host table.
pub const DEFAULT_HOST_KEY: &str = "default";

/// Resolves the breaker configuration for a host.
#[derive(Debug, Clone, Default)]
pub struct BreakerPolicy {
    default: BreakerConfig,
    hosts: HashMap<String, BreakerConfig>,
}

impl BreakerPolicy {
    /// Use one configuration for every host.
    pub fn uniform(config: BreakerConfig) -> Self {
        Self {
            default: config,
            hosts: HashMap::new(),
        }
    }

    /// Build from validated settings, merging partial overrides onto the default.
    pub fn from_settings(settings: &BreakerSettings) -> Self {
        let base = BreakerConfig {
            long_polling_enabled: settings.long_polling,
            max_failed_tries: settings.max_failed_tries,
            open_state_expiry: Duration::from_millis(settings.open_state_expiry_ms),
        };
        let default = match settings.hosts.get(DEFAULT_HOST_KEY) {
            Some(patch) => merge(base, patch),
            None => base,
        };

        let hosts = settings
            .hosts
            .iter()
            .filter(|(host, _)| host.as_str() != DEFAULT_HOST_KEY)
            .map(|(host, patch)| (host.to_ascii_lowercase(), merge(default, patch)))
            .collect();

        Self { default, hosts }
    }

    /// Add or replace the configuration for one host.
    pub fn with_host(mut self, host: impl Into<String>, config: BreakerConfig) -> Self {
        self.hosts.insert(host.into().to_ascii_lowercase(), config);
        self
    }

    /// Configuration for `host`, falling back to the default entry.
    pub fn for_host(&self, host: &str) -> &BreakerConfig {
        self.hosts.get(host).unwrap_or(&self.default)
    }

    pub fn default_config(&self) -> &BreakerConfig {
        &self.default
    }
}

fn merge(base: BreakerConfig, patch: &HostOverride) -> BreakerConfig {
    BreakerConfig {
        long_polling_enabled: patch.long_polling.unwrap_or(base.long_polling_enabled),
        max_failed_tries: patch.max_failed_tries.unwrap_or(base.max_failed_tries),
        open_state_expiry: patch
            .open_state_expiry_ms
            .map(Duration::from_millis)
            .unwrap_or(base.open_state_expiry),
    }
}
