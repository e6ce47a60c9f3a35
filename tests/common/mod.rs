//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use breaker_client::BreakerClient;
use breaker_proxy::config::ProxyConfig;
use breaker_proxy::http::HttpServer;
use breaker_proxy::lifecycle::Shutdown;
use breaker_proxy::resilience::HostRegistry;

/// A proxy running on an ephemeral port.
#[allow(dead_code)]
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<HostRegistry>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestProxy {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A client that talks through this proxy, advertising `request_timeout`.
    pub fn client(&self, request_timeout: Duration) -> BreakerClient {
        BreakerClient::new(&self.url(), Duration::from_secs(10), request_timeout).unwrap()
    }
}

/// Start the proxy with `config`, ignoring its bind address.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&config).unwrap();
    let registry = server.registry();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        registry,
        shutdown,
    }
}

/// Start a simple mock backend that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        if read_request_head(&mut socket).await.is_err() {
                            return;
                        }
                        let (status, body) = f().await;
                        let response = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that answers every request with `raw` verbatim, then closes.
#[allow(dead_code)]
pub async fn start_raw_backend(raw: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request_head(&mut socket).await.is_ok() {
                    let _ = socket.write_all(raw.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });
        }
    });

    addr
}

/// Start a backend that reads each request and never answers.
#[allow(dead_code)]
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request_head(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(600)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub fn unused_addr() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        head.extend_from_slice(&buf[..n]);
    }
    Ok(())
}
