//! Per-connection I/O bounds.
//!
//! The read timeout covers receiving request headers at the connection level.
//! Request bodies are bounded by a layer in the HTTP server. Proxied
//! responses are bounded by the upstream connector.

use std::time::Duration;

use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;

/// Timeouts applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// Bound on reading request headers.
    pub read: Duration,

    /// Bound on producing a response from the local routes.
    pub write: Duration,
}

impl ConnectionTimeouts {
    /// Same bound for reads and writes, as configured with `--timeout`.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            read: timeout,
            write: timeout,
        }
    }

    /// Configure the connection builder used by the server.
    pub fn apply(&self, builder: &mut Builder<TokioExecutor>) {
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read);
    }
}
