//! Response relay from upstream to client.
//!
//! # Responsibilities
//! - Copy status, headers and body of the upstream response
//! - Announce the proxy in `Via`
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped; framing recomputed for the buffered body
//! - Body read failures are handled by the invoker, before relaying

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::Response,
};

use crate::http::headers::{strip_hop_by_hop, VIA_PRODUCT};
use crate::proxy::upstream::UpstreamResponse;

/// Turn an upstream response into the client response.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        mut headers,
        body,
    } = upstream;

    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::VIA, HeaderValue::from_static(VIA_PRODUCT));

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};

    #[tokio::test]
    async fn copies_status_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-upstream", HeaderValue::from_static("1"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert(header::VIA, HeaderValue::from_static("1.1 somewhere"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let response = relay(UpstreamResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"{\"ok\":true}"),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-upstream"], "1");
        assert_eq!(headers.get_all("set-cookie").iter().count(), 2);
        assert_eq!(headers[header::VIA], "circuit-breaker");
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{\"ok\":true}");
    }
}
