//! Circuit breaker state machine for upstream host protection.
//!
//! # States
//! - Closed: normal operation, requests pass through, failures are counted
//! - Open: host assumed down, requests fail fast without an upstream call
//! - Half-Open: cooldown elapsed, requests probe whether the host recovered
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      failure_count reaches max_failed_tries
//! Open      → Half-Open: now > open expiry (checked lazily on every request)
//! Half-Open → Closed:    successes drive failure_count down to exactly 0
//! Half-Open → Open:      any failure, with a fresh expiry
//! ```
//!
//! # Design Decisions
//! - Per-host breaker (not global), records owned by the host registry
//! - Transitions are pure functions of (record, outcome, config, now);
//!   the caller decides when to read and commit
//! - 4xx responses are successes: client errors say nothing about host health

use std::time::Duration;

use tokio::time::Instant;

/// Immutable breaker thresholds applied to one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Hold rejected requests close to the client's declared timeout.
    pub long_polling_enabled: bool,
    /// Failures that trip a closed breaker open. Always > 0 once validated.
    pub max_failed_tries: u32,
    /// How long the breaker stays open before probing.
    pub open_state_expiry: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            long_polling_enabled: false,
            max_failed_tries: 3,
            open_state_expiry: Duration::from_secs(35),
        }
    }
}

/// Breaker state for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Tripped until the given instant.
    Open { until: Instant },
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open { .. } => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, BreakerState::Open { .. })
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one upstream call, as far as the breaker is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Classify an upstream status code: `>= 500` is a failure.
    pub fn from_status(status: u16) -> Self {
        if status < 500 {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// Breaker record for a single destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Host authority (`hostname[:port]`), the registry key.
    pub id: String,
    pub state: BreakerState,
    pub failure_count: u32,
}

impl HostRecord {
    /// A fresh Closed record for a host seen for the first time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: BreakerState::Closed,
            failure_count: 0,
        }
    }

    /// Move an expired Open record to Half-Open.
    ///
    /// Runs before a request is classified, so the first request after the
    /// cooldown is treated as a probe rather than rejected.
    #[must_use]
    pub fn check_expiry(mut self, now: Instant) -> Self {
        if let BreakerState::Open { until } = self.state {
            if now > until {
                self.state = BreakerState::HalfOpen;
            }
        }
        self
    }

    /// Apply the outcome of a forwarded request.
    ///
    /// An Open record is left untouched: it was re-tripped by a concurrent
    /// request after this one was admitted.
    #[must_use]
    pub fn record_outcome(mut self, outcome: Outcome, config: &BreakerConfig, now: Instant) -> Self {
        match (self.state, outcome) {
            (BreakerState::Closed, Outcome::Success) => {
                self.failure_count = self.failure_count.saturating_sub(1);
            }
            (BreakerState::Closed, Outcome::Failure) => {
                self.failure_count = self.failure_count.saturating_add(1);
                if self.failure_count >= config.max_failed_tries {
                    self.state = BreakerState::Open {
                        until: now + config.open_state_expiry,
                    };
                }
            }
            (BreakerState::HalfOpen, Outcome::Success) => {
                self.failure_count = self.failure_count.saturating_sub(1);
                if self.failure_count == 0 {
                    self.state = BreakerState::Closed;
                }
            }
            (BreakerState::HalfOpen, Outcome::Failure) => {
                self.state = BreakerState::Open {
                    until: now + config.open_state_expiry,
                };
            }
            (BreakerState::Open { .. }, _) => {}
        }
        self
    }

    /// Time left before an Open record becomes eligible for probing.
    pub fn open_remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            BreakerState::Open { until } => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }
}
