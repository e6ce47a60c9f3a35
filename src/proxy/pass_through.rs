//! The pass-through pipeline.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → host id (absolute target or Host header)
//!     → registry.get + lazy Open → Half-Open check
//!     → Open:             long-polling hold → 503 JSON
//!     → Closed/Half-Open: buffer body → upstream call → classify
//!                         → registry.update (commit once) → relay
//! ```
//!
//! # Design Decisions
//! - The outcome is applied to the record as committed at commit time, under
//!   the host's shard lock, so concurrent requests never lose updates
//! - A live `>= 500` response is still relayed; the breaker protects only
//!   the requests that come after it
//! - Transport failures count as failures and answer 502/504
//! - A request abandoned mid-call (client gone, lifetime cap hit) still
//!   commits a failure for its host

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::http::error::ProxyError;
use crate::http::request::{host_id, request_id, timeout_hint};
use crate::http::response::relay;
use crate::observability::metrics;
use crate::proxy::upstream::{OutboundRequest, Upstream, UpstreamError, UpstreamResponse};
use crate::resilience::{
    long_poll, BreakerConfig, BreakerPolicy, BreakerState, HostRecord, HostRegistry, Outcome,
};

/// Per-request orchestrator shared by every connection.
#[derive(Debug)]
pub struct PassThrough<U> {
    registry: Arc<HostRegistry>,
    policy: BreakerPolicy,
    upstream: U,
    max_body_size: usize,
    max_hold: Duration,
}

impl<U: Upstream> PassThrough<U> {
    pub fn new(
        registry: Arc<HostRegistry>,
        policy: BreakerPolicy,
        upstream: U,
        max_body_size: usize,
    ) -> Self {
        Self {
            registry,
            policy,
            upstream,
            max_body_size,
            max_hold: Duration::MAX,
        }
    }

    /// Cap long-polling holds so the rejection beats the request lifetime.
    pub fn with_max_hold(mut self, max_hold: Duration) -> Self {
        self.max_hold = max_hold;
        self
    }

    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }

    /// Handle one inbound request. Never fails: errors become responses.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let id = request_id(request.headers()).to_string();
        tracing::debug!(
            request_id = %id,
            method = %request.method(),
            uri = %request.uri(),
            "Proxying request"
        );
        match self.pass_through(request).await {
            Ok(response) => response,
            Err(e) => {
                if !matches!(e, ProxyError::BreakerOpen { .. }) {
                    tracing::warn!(request_id = %id, error = %e, "Request failed");
                }
                e.into_response()
            }
        }
    }

    async fn pass_through(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let host = host_id(&request).ok_or(ProxyError::MissingHost)?;
        let config = self.policy.for_host(&host);

        let observed = self
            .registry
            .get(&host)
            .unwrap_or_else(|| HostRecord::new(host.as_str()))
            .check_expiry(Instant::now());

        match observed.state {
            BreakerState::Open { .. } => {
                let hint = timeout_hint(request.headers());
                if let Some(held) = long_poll::hold(config, hint, self.max_hold).await {
                    tracing::info!(host = %host, held_ms = held.as_millis() as u64, "Held rejected request");
                }
                tracing::info!(host = %host, state = %observed.state, "Attempt rejected");
                metrics::record_rejection();
                Err(ProxyError::BreakerOpen { host })
            }
            BreakerState::Closed | BreakerState::HalfOpen => {
                if observed.state == BreakerState::HalfOpen {
                    tracing::info!(host = %host, failure_count = observed.failure_count, "Half-open probe");
                }
                let outbound = OutboundRequest::from_inbound(&host, request, self.max_body_size).await?;

                let pending = PendingOutcome::new(&self.registry, config, &host);
                let start = std::time::Instant::now();
                let result = self.upstream.call(outbound).await;
                let outcome = classify(&result);
                metrics::record_request(
                    result.as_ref().map(|r| r.status.as_u16()).unwrap_or(0),
                    start,
                );
                pending.settle(outcome);

                match result {
                    Ok(response) => Ok(relay(response)),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Outcome owed to the registry by a forwarded request.
///
/// Dropped unsettled when the request future is cancelled while the
/// upstream call is in flight; that counts as a failure.
struct PendingOutcome<'a> {
    registry: &'a HostRegistry,
    config: &'a BreakerConfig,
    host: &'a str,
    settled: bool,
}

impl<'a> PendingOutcome<'a> {
    fn new(registry: &'a HostRegistry, config: &'a BreakerConfig, host: &'a str) -> Self {
        Self {
            registry,
            config,
            host,
            settled: false,
        }
    }

    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        commit(self.registry, self.config, self.host, outcome);
    }
}

impl Drop for PendingOutcome<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(host = %self.host, "Request abandoned before upstream answered");
            commit(self.registry, self.config, self.host, Outcome::Failure);
        }
    }
}

/// Apply `outcome` to the host's current record under its shard lock.
fn commit(registry: &HostRegistry, config: &BreakerConfig, host: &str, outcome: Outcome) {
    let mut before = None;
    let after = registry.update(host, |current| {
        let now = Instant::now();
        let current = current.check_expiry(now);
        before = Some(current.state);
        current.record_outcome(outcome, config, now)
    });

    let from = before.map(|s| s.as_str()).unwrap_or("closed");
    let to = after.state.as_str();
    if from != to {
        match after.state {
            BreakerState::Open { .. } => tracing::info!(
                host = %host,
                failure_count = after.failure_count,
                "Becoming open"
            ),
            BreakerState::Closed => tracing::info!(host = %host, "Becoming closed"),
            BreakerState::HalfOpen => {}
        }
        metrics::record_transition(from, to);
    }
}

/// Breaker outcome of an upstream call.
pub fn classify(result: &Result<UpstreamResponse, UpstreamError>) -> Outcome {
    match result {
        Ok(response) => Outcome::from_status(response.status.as_u16()),
        Err(e) => {
            tracing::warn!(error = %e, "Upstream call failed");
            Outcome::Failure
        }
    }
}
