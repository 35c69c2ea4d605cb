//! relay-proxy library: rule matching, upstream connectors and hot-reloaded
//! serving snapshots behind an axum front door.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod runtime;
pub mod upstream;

pub use config::schema::{Configuration, ServerSettings};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use runtime::{ProxyContext, Snapshot};
