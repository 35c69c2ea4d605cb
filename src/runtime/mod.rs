//! Runtime state shared between the request path and the reload path.
//!
//! # Data Flow
//! ```text
//! Configuration
//!     → snapshot.rs (validate, build router + connector pool together)
//!     → context.rs (atomic publish through ArcSwap)
//!     → request handlers load one snapshot per request
//! ```

pub mod context;
pub mod snapshot;

pub use context::{ProxyContext, ReloadError};
pub use snapshot::{ApplyError, Snapshot};
