//! Structured logging.
//!
//! `RUST_LOG` takes precedence over the built-in filter. Pretty output is
//! meant for terminals, JSON for log shippers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::LogFormat;

const DEFAULT_FILTER: &str = "relay_proxy=info,tower_http=info";

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init(format: LogFormat, debug: bool) {
    let default = if debug {
        "relay_proxy=debug,tower_http=debug"
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber installed earlier wins.
    let _ = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
    };
}
