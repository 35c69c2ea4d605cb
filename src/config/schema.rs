//! Configuration schema definitions.
//!
//! This module defines the routing configuration read from the YAML source
//! file, plus the startup settings of the listener. Routing types derive Serde
//! traits so the same shape can be loaded, dumped and written back.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Routing configuration: named upstreams and the ordered rule list.
///
/// Rule order is a priority order. The first rule that matches a request wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// Backend targets, keyed by name.
    pub upstreams: Vec<Upstream>,

    /// Ordered routing rules.
    pub rules: Vec<Rule>,
}

/// A named backend target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Upstream {
    /// Unique upstream identifier, referenced by rules.
    pub name: String,

    /// Backend hostname or IP address.
    pub host: String,

    /// Backend port. Missing or zero means the scheme default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// `http` or `https`. Empty means `http`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheme: String,
}

impl Upstream {
    /// The scheme after defaulting, as written in the source.
    pub fn effective_scheme(&self) -> &str {
        if self.scheme.is_empty() {
            "http"
        } else {
            &self.scheme
        }
    }

    /// The port after defaulting: 443 for https, 80 otherwise.
    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) if port != 0 => port,
            _ if self.effective_scheme() == "https" => 443,
            _ => 80,
        }
    }

    /// Base address this upstream forwards to, e.g. `https://api.internal:443`.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.effective_scheme(),
            self.host,
            self.effective_port()
        )
    }
}

/// A routing rule binding a host/path predicate to an upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Rule {
    /// Path to compare against the request path. Must not be empty.
    pub path: String,

    /// Name of the upstream to forward to.
    pub upstream: String,

    /// `prefix` (default when empty) or `exact`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub match_mode: String,

    /// Host to match exactly. Empty matches any host.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Remove the first occurrence of `path` from the request path before forwarding.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strip_path: bool,
}

/// How a rule's path is compared against the request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Request path starts with the rule path.
    #[default]
    Prefix,
    /// Request path equals the rule path.
    Exact,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "prefix" => Ok(MatchMode::Prefix),
            "exact" => Ok(MatchMode::Exact),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Prefix => f.write_str("prefix"),
            MatchMode::Exact => f.write_str("exact"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for terminals.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Startup settings for the listener and the connectors.
///
/// These are fixed for the life of the process. Only the routing
/// [`Configuration`] is reloaded.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port to listen on, on all interfaces.
    pub port: u16,

    /// Connection read/write timeout and backend dial timeout.
    pub timeout: Duration,

    /// Directory holding `cert.pem` and `key.pem`. TLS is off when unset.
    pub cert_dir: Option<PathBuf>,

    /// Path of the routing configuration file.
    pub config_path: PathBuf,

    /// Expose the configuration dump endpoint.
    pub debug: bool,

    /// Skip certificate verification towards https upstreams.
    pub tls_skip_verify: bool,

    /// Send the inbound Host header upstream instead of the upstream's own.
    pub preserve_host: bool,

    /// Base64-encoded YAML used as the initial configuration.
    pub inline_config: Option<String>,

    /// Bind address of the Prometheus endpoint. Metrics export is off when unset.
    pub metrics_address: Option<SocketAddr>,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            timeout: Duration::from_secs(5),
            cert_dir: None,
            config_path: PathBuf::from("./config.yaml"),
            debug: false,
            tls_skip_verify: false,
            preserve_host: false,
            inline_config: None,
            metrics_address: None,
            log_format: LogFormat::Pretty,
        }
    }
}
