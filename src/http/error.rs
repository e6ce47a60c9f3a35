//! Per-request errors and their client-facing responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::proxy::upstream::UpstreamError;

/// Everything that can end a single proxied request early.
///
/// None of these escape the request that produced them.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("circuit-breaker open for host: {host}")]
    BreakerOpen { host: String },

    #[error("request has no destination host")]
    MissingHost,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    RequestBody(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::MissingHost | ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Upstream(UpstreamError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn breaker_open_body_is_valid_json() {
        let response = ProxyError::BreakerOpen {
            host: "api.example.com".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "circuit-breaker open for host: api.example.com" })
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ProxyError::MissingHost.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::BodyTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::from(UpstreamError::Timeout { host: "h".into() }).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::from(UpstreamError::Unreachable {
                host: "h".into(),
                reason: "connection refused".into(),
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(UpstreamError::Body {
                host: "h".into(),
                reason: "reset".into(),
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
