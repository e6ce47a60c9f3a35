//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline, registry and lifecycle produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (host, state, status) on every breaker event
//! - Request ID flows through the trace layer
//! - Metrics are no-ops until a recorder is installed, so tests need no setup

pub mod logging;
pub mod metrics;
