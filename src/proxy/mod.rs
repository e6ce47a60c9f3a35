//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP server (catch-all route)
//!     → pass_through.rs (breaker decision, commit)
//!     → upstream.rs (outbound rewrite, pooled call)
//!     → http/response.rs (relay back to client)
//! ```

pub mod pass_through;
pub mod upstream;

pub use pass_through::PassThrough;
pub use upstream::{HttpUpstream, OutboundRequest, Upstream, UpstreamError, UpstreamResponse};
