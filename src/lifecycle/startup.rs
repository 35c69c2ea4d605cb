//! Startup orchestration.
//!
//! # Order
//! 1. Metrics exporter (optional)
//! 2. Context with the initial configuration (inline, else file)
//! 3. Config file watcher
//! 4. TLS material (optional, plaintext fallback)
//! 5. Listener bind (fatal on failure)
//! 6. Serve until shutdown
//!
//! Configuration problems never stop startup; the proxy serves the empty
//! snapshot and waits for a good write.

use thiserror::Error;

use crate::config::loader::{decode_inline, load_config, LoadError};
use crate::config::schema::{Configuration, ServerSettings};
use crate::config::watcher::{ConfigWatcher, WatchSettings};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{listener, tls, ListenerError};
use crate::observability::metrics;
use crate::runtime::ProxyContext;
use crate::upstream::ConnectorOptions;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Read the initial configuration: inline base64 when given, else the file.
pub fn initial_config(settings: &ServerSettings) -> Result<Configuration, LoadError> {
    match &settings.inline_config {
        Some(encoded) => decode_inline(encoded),
        None => load_config(&settings.config_path),
    }
}

/// Build the shared context and apply the initial configuration.
///
/// Any failure is logged and leaves the empty snapshot serving.
pub fn build_context(settings: &ServerSettings) -> ProxyContext {
    let context = ProxyContext::new(ConnectorOptions::from_settings(settings));

    let applied = initial_config(settings)
        .map_err(|e| e.to_string())
        .and_then(|config| context.apply(config).map_err(|e| e.to_string()));
    if let Err(e) = applied {
        tracing::warn!(
            path = %settings.config_path.display(),
            inline = settings.inline_config.is_some(),
            error = %e,
            "Initial configuration not loaded, serving empty configuration"
        );
    }

    context
}

/// Run the proxy until `shutdown` is triggered.
pub async fn run(settings: ServerSettings, shutdown: Shutdown) -> Result<(), StartupError> {
    if let Some(addr) = settings.metrics_address {
        if let Err(e) = metrics::init_exporter(addr) {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    let context = build_context(&settings);

    let watcher = match ConfigWatcher::spawn(
        &settings.config_path,
        context.clone(),
        WatchSettings::default(),
    ) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(
                path = %settings.config_path.display(),
                error = %e,
                "Config watcher not started, hot reload disabled"
            );
            None
        }
    };

    let tls = tls::load(settings.cert_dir.as_deref());
    let listener = listener::bind(settings.port)?;

    let server = HttpServer::new(context, &settings, tls);
    server.run(listener, shutdown.subscribe()).await?;

    drop(watcher);
    Ok(())
}
