use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tokio::time::Instant;

use crate::admin::AdminState;
use crate::resilience::HostRecord;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_hosts: usize,
    pub host_capacity: usize,
}

/// Breaker record as exposed to operators.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HostSnapshot {
    pub id: String,
    pub state: &'static str,
    pub failure_count: u32,
    /// Milliseconds until an open breaker starts probing.
    pub open_remaining_ms: Option<u64>,
}

impl HostSnapshot {
    pub fn new(record: &HostRecord, now: Instant) -> Self {
        Self {
            id: record.id.clone(),
            state: record.state.as_str(),
            failure_count: record.failure_count,
            open_remaining_ms: record
                .open_remaining(now)
                .map(|d| d.as_millis() as u64),
        }
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_hosts: state.registry.len(),
        host_capacity: state.registry.capacity(),
    })
}

pub async fn get_host(
    State(state): State<AdminState>,
    Path(host): Path<String>,
) -> Result<Json<HostSnapshot>, StatusCode> {
    let now = Instant::now();
    // Report the state the next request would observe.
    state
        .registry
        .peek(&host.to_ascii_lowercase())
        .map(|record| Json(HostSnapshot::new(&record.check_expiry(now), now)))
        .ok_or(StatusCode::NOT_FOUND)
}
