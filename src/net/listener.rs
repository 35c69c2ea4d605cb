//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the front-door port on all interfaces
//! - Hand a ready, non-blocking socket to the HTTP server

use std::net::{SocketAddr, TcpListener};

use thiserror::Error;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind `0.0.0.0:<port>`.
pub fn bind(port: u16) -> Result<TcpListener, ListenerError> {
    bind_addr(SocketAddr::from(([0, 0, 0, 0], port)))
}

/// Bind a specific address. Port 0 picks a free port.
pub fn bind_addr(addr: SocketAddr) -> Result<TcpListener, ListenerError> {
    let bind_err = |source| ListenerError::Bind { addr, source };

    let listener = TcpListener::bind(addr).map_err(bind_err)?;
    listener.set_nonblocking(true).map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}
