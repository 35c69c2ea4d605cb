//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bound socket)
//!     → tls.rs (optional TLS, plaintext fallback)
//!     → connection.rs (header read timeout)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind failure is fatal; TLS failure is not
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::ConnectionTimeouts;
pub use listener::ListenerError;
pub use tls::TlsError;
