//! relay-proxy: host/path reverse proxy with hot-reloaded routing rules.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────▶ net::listener ──▶ http::server ──▶ http::proxy
//!                 (+ net::tls)      (health/debug)        │
//!                                                         ▼
//!                                           runtime::Snapshot (one per request)
//!                                             ├─ routing::Router (first match)
//!                                             └─ upstream::ConnectorPool
//!                                                         │
//!     Client Response                                     ▼
//!     ◀────────── stamped response ◀──────────── upstream::Connector ◀──── Backend
//!
//!     config file ──▶ config::watcher ──▶ runtime::ProxyContext (atomic swap)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use relay_proxy::config::{LogFormat, ServerSettings};
use relay_proxy::lifecycle::{signals, startup, Shutdown};
use relay_proxy::observability::logging;

/// Host/path reverse proxy.
#[derive(Debug, Parser)]
#[command(name = "relay-proxy", version, about, long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Read/write and backend dial timeout, in seconds.
    #[arg(long, env = "TIMEOUT", default_value_t = 5)]
    timeout: u64,

    /// Directory containing cert.pem and key.pem.
    #[arg(long, env = "CERT_PATH")]
    cert_path: Option<PathBuf>,

    /// Routing configuration file.
    #[arg(short = 'c', long = "config", env = "CONF_FILE", default_value = "./config.yaml")]
    config: PathBuf,

    /// Expose the configuration dump endpoint and log verbosely.
    #[arg(long, env = "DEBUG", value_parser = clap::builder::BoolishValueParser::new(), default_value_t = false)]
    debug: bool,

    /// Skip certificate verification towards https upstreams.
    #[arg(long, env = "TLS_SKIP_VERIFY", value_parser = clap::builder::BoolishValueParser::new(), default_value_t = false)]
    tls_skip_verify: bool,

    /// Send the inbound Host header to upstreams.
    #[arg(long, env = "PRESERVE_HOST", value_parser = clap::builder::BoolishValueParser::new(), default_value_t = false)]
    preserve_host: bool,

    /// Base64-encoded YAML used as the initial configuration.
    #[arg(long, env = "CONF_BASE64")]
    config_base64: Option<String>,

    /// Address for the Prometheus metrics endpoint.
    #[arg(long, env = "METRICS_ADDRESS")]
    metrics_address: Option<SocketAddr>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl From<Cli> for ServerSettings {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            timeout: Duration::from_secs(cli.timeout),
            cert_dir: cli.cert_path,
            config_path: cli.config,
            debug: cli.debug,
            tls_skip_verify: cli.tls_skip_verify,
            preserve_host: cli.preserve_host,
            inline_config: cli.config_base64,
            metrics_address: cli.metrics_address,
            log_format: cli.log_format,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = ServerSettings::from(Cli::parse());
    logging::init(settings.log_format, settings.debug);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = settings.port,
        timeout_secs = settings.timeout.as_secs(),
        config = %settings.config_path.display(),
        debug = settings.debug,
        preserve_host = settings.preserve_host,
        "relay-proxy starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_stop_listener(shutdown.clone());

    startup::run(settings, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
