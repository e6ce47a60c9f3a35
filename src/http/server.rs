//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, request lifetime cap)
//! - Build the host registry, breaker policy and upstream client
//! - Serve until the shutdown signal, then drain

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::UuidRequestId;
use crate::proxy::{HttpUpstream, PassThrough, Upstream};
use crate::resilience::{long_poll, BreakerPolicy, HostRegistry};

/// HTTP server for the circuit-breaker proxy.
pub struct HttpServer {
    router: Router,
    registry: Arc<HostRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let upstream = HttpUpstream::new(&config.timeouts)?;
        Ok(Self::with_upstream(config, upstream))
    }

    /// Create a server that forwards through a custom upstream.
    pub fn with_upstream<U: Upstream>(config: &ProxyConfig, upstream: U) -> Self {
        let capacity = NonZeroUsize::new(config.breaker.host_capacity).unwrap_or(NonZeroUsize::MIN);
        let shards = NonZeroUsize::new(config.breaker.registry_shards).unwrap_or(NonZeroUsize::MIN);
        let registry = Arc::new(HostRegistry::with_shards(capacity, shards));

        let request_lifetime = Duration::from_secs(config.timeouts.request_secs);
        let pass_through = Arc::new(
            PassThrough::new(
                registry.clone(),
                BreakerPolicy::from_settings(&config.breaker),
                upstream,
                config.security.max_body_size,
            )
            .with_max_hold(long_poll::max_hold(request_lifetime)),
        );

        let router = Self::build_router(config, pass_through);
        Self { router, registry }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router<U: Upstream>(config: &ProxyConfig, pass_through: Arc<PassThrough<U>>) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler::<U>))
            .route("/", any(proxy_handler::<U>))
            .with_state(pass_through)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// Shared handle to the breaker records, for inspection.
    pub fn registry(&self) -> Arc<HostRegistry> {
        self.registry.clone()
    }

    /// The configured router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            host_capacity = self.registry.capacity(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all proxy handler: every method, every path.
async fn proxy_handler<U: Upstream>(
    State(pass_through): State<Arc<PassThrough<U>>>,
    request: Request<Body>,
) -> Response {
    pass_through.handle(request).await
}
