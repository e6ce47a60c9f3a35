//! Inbound request inspection.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for tracing
//! - Extract the destination host identifier (the breaker's partition key)
//! - Read the client's timeout hint and original scheme
//!
//! # Design Decisions
//! - Absolute-form targets win over the `Host` header
//! - Host identifiers are lower-cased and stripped of userinfo
//! - Malformed hints are treated as absent, never as errors

use axum::http::{header, uri::Authority, HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::http::headers::{REQUEST_TIMEOUT, X_FORWARDED_PROTO, X_REQUEST_ID};

/// Scheme used towards the origin when the client did not say otherwise.
pub const DEFAULT_SCHEME: &str = "https";

/// Generates `x-request-id` values for requests that lack one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request's correlation ID, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Destination host identifier (`hostname[:port]`) of a request.
pub fn host_id<B>(request: &Request<B>) -> Option<String> {
    if let Some(authority) = request.uri().authority() {
        return Some(normalize(authority));
    }

    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Authority>().ok())
        .map(|authority| normalize(&authority))
}

fn normalize(authority: &Authority) -> String {
    let host = authority.host().to_ascii_lowercase();
    match authority.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

/// Client timeout hint from `Request-Timeout` in milliseconds; 0 when absent or unparsable.
pub fn timeout_hint(headers: &HeaderMap) -> u64 {
    headers
        .get(REQUEST_TIMEOUT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Outbound scheme from `X-Forwarded-Proto`, defaulting to https.
pub fn forwarded_scheme(headers: &HeaderMap) -> &'static str {
    let proto = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    match proto {
        Some(p) if p.eq_ignore_ascii_case("http") => "http",
        _ => DEFAULT_SCHEME,
    }
}
