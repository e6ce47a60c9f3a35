//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, timeouts > 0, addresses parse)
//! - Apply the same ranges to every per-host override
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{HostOverride, ProxyConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,

    #[error(
        "timeouts.request_secs ({request_secs}) must exceed timeouts.connect_secs + \
         timeouts.upstream_secs ({upstream_bound})"
    )]
    RequestOutlivedByUpstream { request_secs: u64, upstream_bound: u64 },
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }

    let breaker = &config.breaker;
    check_positive(&mut errors, "breaker.max_failed_tries", breaker.max_failed_tries as u64);
    check_positive(&mut errors, "breaker.open_state_expiry_ms", breaker.open_state_expiry_ms);
    check_positive(&mut errors, "breaker.host_capacity", breaker.host_capacity as u64);
    check_positive(&mut errors, "breaker.registry_shards", breaker.registry_shards as u64);

    let mut hosts: Vec<_> = breaker.hosts.iter().collect();
    hosts.sort_by(|a, b| a.0.cmp(b.0));
    for (host, host_override) in hosts {
        check_override(&mut errors, host, host_override);
    }

    let timeouts = &config.timeouts;
    check_positive(&mut errors, "timeouts.connect_secs", timeouts.connect_secs);
    check_positive(&mut errors, "timeouts.request_secs", timeouts.request_secs);
    check_positive(&mut errors, "timeouts.upstream_secs", timeouts.upstream_secs);
    check_positive(&mut errors, "timeouts.idle_secs", timeouts.idle_secs);
    // An upstream timeout must surface before the listener gives up on the request.
    let upstream_bound = timeouts.connect_secs.saturating_add(timeouts.upstream_secs);
    if timeouts.request_secs <= upstream_bound {
        errors.push(ValidationError::RequestOutlivedByUpstream {
            request_secs: timeouts.request_secs,
            upstream_bound,
        });
    }

    check_positive(&mut errors, "security.max_body_size", config.security.max_body_size as u64);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero {
            field: field.to_string(),
        });
    }
}

fn check_override(errors: &mut Vec<ValidationError>, host: &str, host_override: &HostOverride) {
    if host_override.max_failed_tries == Some(0) {
        check_positive(errors, &format!("breaker.hosts.{host}.max_failed_tries"), 0);
    }
    if host_override.open_state_expiry_ms == Some(0) {
        check_positive(errors, &format!("breaker.hosts.{host}.open_state_expiry_ms"), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.breaker.max_failed_tries = 0;
        config.breaker.host_capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: "not-an-address".into(),
        }));
        assert!(errors.contains(&ValidationError::Zero {
            field: "breaker.max_failed_tries".into(),
        }));
    }

    #[test]
    fn host_overrides_are_range_checked() {
        let mut config = ProxyConfig::default();
        config.breaker.hosts.insert(
            "api.example.com".into(),
            HostOverride {
                max_failed_tries: Some(0),
                ..Default::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::Zero {
                field: "breaker.hosts.api.example.com.max_failed_tries".into(),
            }]
        );
    }

    #[test]
    fn request_lifetime_must_outlast_upstream_timeout() {
        let mut config = ProxyConfig::default();
        config.timeouts.request_secs = 1;
        config.timeouts.upstream_secs = 30;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::RequestOutlivedByUpstream {
                request_secs: 1,
                upstream_bound: 35,
            }]
        );

        config.timeouts.request_secs = 36;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn admin_requires_api_key() {
        let mut config = ProxyConfig::default();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingAdminKey]);
    }
}
