//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (evaluate host + path conditions)
//!     → Return: matched Route or NoMatch
//!
//! Route Compilation (per snapshot):
//!     Rule[] (validated, source order)
//!     → Compile matchers
//!     → Freeze as immutable Router inside the Snapshot
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per configuration, immutable at runtime
//! - No regex in hot path (prefix/exact comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by position in the source file)

pub mod matcher;
pub mod router;

pub use router::{Route, Router};
