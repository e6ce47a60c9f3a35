//! Circuit-breaker forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ proxy::pass_through ──▶ proxy::upstream ──▶ Origin
//!                                    │        ▲
//!                                    ▼        │
//!                          resilience::registry (per-host breaker records)
//!                          resilience::circuit_breaker (transitions)
//!                          resilience::long_poll (hold before 503)
//! ```
//!
//! Configuration comes from an optional TOML file, overridden by command
//! line flags and their environment variables.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use breaker_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use breaker_proxy::lifecycle::{wait_for_signal, Shutdown};
use breaker_proxy::observability::{logging, metrics};
use breaker_proxy::{admin, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "breaker-proxy", version)]
#[command(about = "HTTP forward proxy with per-host circuit breakers", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "BREAKER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to accept proxy traffic on.
    #[arg(long = "bind", env = "BREAKER_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Hold rejections for 80% of the client's Request-Timeout.
    #[arg(long, env = "BREAKER_LONG_POLLING")]
    long_polling: Option<bool>,

    /// Failures before a breaker opens.
    #[arg(long, env = "BREAKER_MAX_FAILED_TRIES")]
    max_failed_tries: Option<u32>,

    /// Milliseconds a breaker stays open before probing.
    #[arg(long, env = "BREAKER_OPEN_STATE_EXPIRY_MS")]
    open_state_expiry_ms: Option<u64>,
}

impl Cli {
    fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(addr) = &self.bind_address {
            config.listener.bind_address = addr.clone();
        }
        if let Some(enabled) = self.long_polling {
            config.breaker.long_polling = enabled;
        }
        if let Some(tries) = self.max_failed_tries {
            config.breaker.max_failed_tries = tries;
        }
        if let Some(ms) = self.open_state_expiry_ms {
            config.breaker.open_state_expiry_ms = ms;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "breaker-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        long_polling = config.breaker.long_polling,
        max_failed_tries = config.breaker.max_failed_tries,
        open_state_expiry_ms = config.breaker.open_state_expiry_ms,
        host_overrides = config.breaker.hosts.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };
    let server = HttpServer::new(&config)?;

    if let Some(admin_listener) = admin_listener {
        let admin_config = config.admin.clone();
        let registry = server.registry();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(admin_listener, &admin_config, registry, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
