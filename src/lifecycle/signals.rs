//! OS signal handling.
//!
//! Ctrl-C and SIGTERM both mean stop. There is no reload signal; the
//! configuration file watcher covers reloads.

use tokio::signal;

use crate::lifecycle::shutdown::Shutdown;

/// Resolve on the first Ctrl-C or SIGTERM.
pub async fn wait_for_stop() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Trigger `shutdown` when the process is asked to stop.
pub fn spawn_stop_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        wait_for_stop().await;
        shutdown.trigger();
    });
}
