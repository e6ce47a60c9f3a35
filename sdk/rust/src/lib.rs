//! Client helper for talking to origins through the circuit-breaker proxy.
//!
//! The proxy speaks plain HTTP to its clients and performs TLS to the
//! origin itself. [`BreakerClient`] records the scheme the caller asked for
//! in `X-Forwarded-Proto`, downgrades the target to `http`, and advertises
//! its timeout in `Request-Timeout` so the proxy can size long-poll holds.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, Url};

pub const REQUEST_TIMEOUT: &str = "request-timeout";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub struct BreakerClient {
    client: Client,
    request_timeout: Duration,
}

impl BreakerClient {
    /// Route every request through the proxy at `proxy_url`.
    ///
    /// `local_timeout` bounds the whole call on this side; `request_timeout`
    /// is what the proxy is told the caller will wait.
    pub fn new(
        proxy_url: &str,
        local_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .proxy(reqwest::Proxy::http(proxy_url)?)
            .timeout(local_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// Start a request to `url`, already rewritten for the proxy.
    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ClientError> {
        let mut target = Url::parse(url).map_err(|e| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let scheme = target.scheme().to_string();
        if scheme != "http" && target.set_scheme("http").is_err() {
            return Err(ClientError::InvalidUrl {
                url: url.to_string(),
                reason: format!("cannot forward scheme {scheme}"),
            });
        }

        Ok(self
            .client
            .request(method, target)
            .header(X_FORWARDED_PROTO, scheme)
            .header(REQUEST_TIMEOUT, self.request_timeout.as_millis().to_string()))
    }

    pub async fn get(&self, url: &str) -> Result<Response, ClientError> {
        Ok(self.request(Method::GET, url)?.send().await?)
    }
}
