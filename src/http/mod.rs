//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, timeouts)
//!     → proxy.rs (load snapshot, match rule, pick connector)
//!     → request.rs (origin capture, X-Forwarded-*)
//!     → upstream connector forwards
//!     → response.rs (strip hop-by-hop, stamp, error mapping)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::AppState;
pub use response::{ProxyError, ResponseStamp};
pub use server::{HttpServer, CONFIG_PATH, HEALTH_PATH};
