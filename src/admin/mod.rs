//! Admin API for inspecting breaker state.
//!
//! Served on its own listener so that every path on the proxy listener
//! stays a pass-through path.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::AdminConfig;
use crate::resilience::HostRegistry;

use self::auth::admin_auth_middleware;
use self::handlers::{get_host, get_status};

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<HostRegistry>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/hosts/{host}", get(get_host))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    config: &AdminConfig,
    registry: Arc<HostRegistry>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    let router = setup_admin_router(AdminState {
        registry,
        api_key: Arc::from(config.api_key.as_str()),
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
