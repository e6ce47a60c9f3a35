//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_proxy_requests_total` (counter): forwarded requests by status
//! - `breaker_proxy_request_duration_seconds` (histogram): upstream latency
//! - `breaker_proxy_rejections_total` (counter): fail-fast rejections
//! - `breaker_proxy_state_transitions_total` (counter): breaker transitions by from, to
//! - `breaker_proxy_registry_evictions_total` (counter): hosts dropped by the LRU
//!
//! Host identifiers come from clients, so they never become label values;
//! per-host detail lives in logs and the admin API.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed upstream call. `status` is 0 when no response arrived.
pub fn record_request(status: u16, start: Instant) {
    counter!("breaker_proxy_requests_total", "status" => status.to_string()).increment(1);
    histogram!("breaker_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rejection() {
    counter!("breaker_proxy_rejections_total").increment(1);
}

pub fn record_transition(from: &'static str, to: &'static str) {
    counter!("breaker_proxy_state_transitions_total", "from" => from, "to" => to).increment(1);
}

pub fn record_eviction() {
    counter!("breaker_proxy_registry_evictions_total").increment(1);
}
