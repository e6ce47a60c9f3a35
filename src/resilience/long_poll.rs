//! Long-polling hold for rejected requests.
//!
//! When a host's breaker is open, answering instantly invites the client to
//! retry in a tight loop. With long polling enabled the rejection is delayed
//! to 80% of the client's declared `Request-Timeout`, just short of the point
//! where the client would give up on its own.

use std::time::Duration;

use crate::resilience::circuit_breaker::BreakerConfig;

/// Share of the client's timeout hint spent holding, in percent.
pub const HOLD_PERCENTILE: u64 = 80;

/// Headroom kept between the longest hold and the request lifetime.
pub const HOLD_MARGIN: Duration = Duration::from_millis(250);

/// Longest hold that still answers before `request_lifetime` runs out.
pub fn max_hold(request_lifetime: Duration) -> Duration {
    request_lifetime.saturating_sub(HOLD_MARGIN)
}

/// How long to hold a rejection, if at all. `hint_ms` of 0 means no hint.
pub fn hold_duration(config: &BreakerConfig, hint_ms: u64) -> Option<Duration> {
    if !config.long_polling_enabled || hint_ms == 0 {
        return None;
    }
    Some(Duration::from_millis(hint_ms.saturating_mul(HOLD_PERCENTILE) / 100))
}

/// Sleep for the hold duration, at most `max`, returning what was held.
pub async fn hold(config: &BreakerConfig, hint_ms: u64, max: Duration) -> Option<Duration> {
    let duration = hold_duration(config, hint_ms)?.min(max);
    tokio::time::sleep(duration).await;
    Some(duration)
}
