//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, catch-all routes)
//!     → request.rs (request ID, host id, timeout hint, scheme)
//!     → proxy::PassThrough (breaker decision + upstream call)
//!     → response.rs (relay, Via header) or error.rs (JSON error)
//!     → Send to client
//! ```

pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use error::ProxyError;
pub use server::HttpServer;
