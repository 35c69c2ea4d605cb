//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Initial config → Context → Watcher → TLS → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → listener stops → process exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Bind failure is the only fatal startup error
//! - Shutdown does not drain in-flight requests

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
