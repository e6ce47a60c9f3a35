//! Upstream invocation.
//!
//! # Responsibilities
//! - Rewrite the inbound request into a well-formed outbound one
//!   (origin-form target, scheme from `X-Forwarded-Proto`)
//! - Perform the call over a pooled keep-alive client
//! - Turn every transport problem into an [`UpstreamError`] value
//!
//! # Design Decisions
//! - [`Upstream`] is the seam between the pipeline and the network
//! - Redirects are relayed, never followed
//! - Response bodies are read in full so read failures stay per-request

use std::future::Future;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
};

use http_body_util::LengthLimitError;

use crate::config::TimeoutConfig;
use crate::http::error::ProxyError;
use crate::http::headers::strip_hop_by_hop;
use crate::http::request::forwarded_scheme;

/// Transport-level failure of one upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unreachable for host: {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("upstream timed out for host: {host}")]
    Timeout { host: String },

    #[error("failed to read upstream response from host: {host}: {reason}")]
    Body { host: String, reason: String },
}

/// A request ready to be sent to the origin.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub host: String,
    pub method: Method,
    /// Absolute URL: `{scheme}://{host}{path_and_query}`.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    /// Build the outbound request from inbound parts and a buffered body.
    ///
    /// The client's request target is dropped in favour of the origin-form
    /// path, and `Host` is left for the client to derive from the URL.
    pub fn from_parts(host: &str, parts: &Parts, body: Bytes) -> Self {
        let scheme = forwarded_scheme(&parts.headers);
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut headers = parts.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        Self {
            host: host.to_string(),
            method: parts.method.clone(),
            url: format!("{scheme}://{host}{path_and_query}"),
            headers,
            body,
        }
    }

    /// Split an inbound request, buffering at most `limit` body bytes.
    pub async fn from_inbound(
        host: &str,
        request: axum::http::Request<Body>,
        limit: usize,
    ) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            if is_length_limit(&e) {
                ProxyError::BodyTooLarge { limit }
            } else {
                ProxyError::RequestBody(e.to_string())
            }
        })?;
        Ok(Self::from_parts(host, &parts, body))
    }
}

fn is_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// A fully read upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Performs outbound calls to origin hosts.
pub trait Upstream: Send + Sync + 'static {
    fn call(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}

/// Production upstream backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.upstream_secs))
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    async fn call(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let OutboundRequest {
            host,
            method,
            url,
            headers,
            body,
        } = request;

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(&host, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        tracing::debug!(host = %host, status = %status, "Received upstream response");

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout { host: host.clone() }
            } else {
                UpstreamError::Body {
                    host: host.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(host: &str, error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout {
            host: host.to_string(),
        }
    } else {
        UpstreamError::Unreachable {
            host: host.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn rewrites_target_with_default_scheme() {
        let parts = parts("http://api.example.com/v1/items?page=2", &[]);
        let outbound = OutboundRequest::from_parts("api.example.com", &parts, Bytes::new());
        assert_eq!(outbound.url, "https://api.example.com/v1/items?page=2");
        assert_eq!(outbound.method, Method::POST);
    }

    #[test]
    fn honours_forwarded_proto() {
        let parts = parts("/health", &[("x-forwarded-proto", "http"), ("host", "svc:8080")]);
        let outbound = OutboundRequest::from_parts("svc:8080", &parts, Bytes::new());
        assert_eq!(outbound.url, "http://svc:8080/health");
    }

    #[test]
    fn strips_connection_level_headers() {
        let parts = parts(
            "http://api.example.com/",
            &[
                ("host", "api.example.com"),
                ("connection", "keep-alive"),
                ("content-length", "3"),
                ("proxy-authorization", "Basic abc"),
                ("authorization", "Bearer token"),
                ("request-timeout", "1000"),
            ],
        );
        let outbound = OutboundRequest::from_parts("api.example.com", &parts, Bytes::from_static(b"abc"));

        assert!(outbound.headers.get(header::HOST).is_none());
        assert!(outbound.headers.get(header::CONNECTION).is_none());
        assert!(outbound.headers.get(header::CONTENT_LENGTH).is_none());
        assert!(outbound.headers.get(header::PROXY_AUTHORIZATION).is_none());
        assert_eq!(outbound.headers[header::AUTHORIZATION], "Bearer token");
        assert_eq!(outbound.headers["request-timeout"], "1000");
        assert_eq!(&outbound.body[..], b"abc");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let request = Request::builder()
            .uri("http://api.example.com/")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        let err = OutboundRequest::from_inbound("api.example.com", request, 16)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::BodyTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn body_within_limit_is_buffered() {
        let request = Request::builder()
            .uri("http://api.example.com/")
            .body(Body::from(vec![7u8; 16]))
            .unwrap();
        let outbound = OutboundRequest::from_inbound("api.example.com", request, 16)
            .await
            .unwrap();
        assert_eq!(outbound.body.len(), 16);
    }

    #[tokio::test]
    async fn length_limit_found_by_type() {
        let limited = axum::body::to_bytes(Body::from(vec![0u8; 64]), 16)
            .await
            .unwrap_err();
        assert!(is_length_limit(&limited));

        let other = axum::Error::new(std::io::Error::other("length limit exceeded"));
        assert!(!is_length_limit(&other));
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error_value() {
        let upstream = HttpUpstream::new(&TimeoutConfig::default()).unwrap();
        // Bind then drop to get a port nothing listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let host = addr.to_string();
        let outbound = OutboundRequest {
            host: host.clone(),
            method: Method::GET,
            url: format!("http://{host}/"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        let err = upstream.call(outbound).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Unreachable { host: h, .. } if h == host));
    }
}
