//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → upstream name identified
//!     → pool.rs (look up connector by name)
//!     → connector.rs (rewrite request onto the fixed backend address)
//!     → tls.rs (client TLS policy for https backends)
//!     → Backend response, stamped, or ForwardError
//! ```
//!
//! # Design Decisions
//! - Exactly one target per upstream name; no balancing
//! - Pool is built whole per snapshot and never modified afterwards
//! - Connector construction failures reject the whole configuration
//! - The connect phase (TCP + TLS) and the wait for response headers are
//!   bounded separately

pub mod connector;
pub mod pool;
pub mod timeout;
pub mod tls;

pub use connector::{Connector, ConnectorError, ConnectorOptions, ForwardError, UpstreamConnector};
pub use pool::ConnectorPool;
