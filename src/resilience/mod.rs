//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to host:
//!     → registry.rs (read the host's breaker record)
//!     → circuit_breaker.rs (lazy Open → Half-Open check)
//!     → Open: long_poll.rs (optional hold) → 503
//!     → Closed/Half-Open: forward, then circuit_breaker.rs applies the
//!       outcome and registry.rs commits it under the host's shard lock
//! ```
//!
//! # Design Decisions
//! - Breaker state is per host, bounded by an LRU registry
//! - Transitions are pure; the registry serializes commits per host
//! - Per-host thresholds resolved through policy.rs

pub mod circuit_breaker;
pub mod long_poll;
pub mod policy;
pub mod registry;

pub use circuit_breaker::{BreakerConfig, BreakerState, HostRecord, Outcome};
pub use policy::BreakerPolicy;
pub use registry::HostRegistry;
