//! Immutable serving state derived from one configuration.

use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::Configuration;
use crate::config::validation::{validate, ValidationError};
use crate::routing::{Route, Router};
use crate::upstream::{Connector, ConnectorError, ConnectorOptions, ConnectorPool};

/// Why a configuration could not be turned into a snapshot.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Rules, connectors and the configuration they came from, built together.
///
/// A snapshot is never modified once built. Requests hold an `Arc` to one
/// snapshot for their whole lifetime, so rules and connectors always belong
/// to the same configuration.
#[derive(Debug, Default)]
pub struct Snapshot {
    config: Arc<Configuration>,
    router: Router,
    connectors: ConnectorPool,
}

impl Snapshot {
    /// Snapshot with no rules and no upstreams. Every routed request gets 404.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate `config` and build its router and connectors.
    ///
    /// Invalid rules are dropped with a warning. An invalid upstream fails the
    /// whole build.
    pub fn build(config: Configuration, options: &ConnectorOptions) -> Result<Self, ApplyError> {
        let rules = validate(&config)?;
        let connectors = ConnectorPool::build(&config.upstreams, options)?;
        let router = Router::from_rules(rules);

        for route in router.routes() {
            if !connectors.contains(&route.upstream) {
                tracing::warn!(
                    rule = route.index,
                    upstream = %route.upstream,
                    "Rule references an unknown upstream, matching requests will get 502"
                );
            }
        }

        Ok(Self {
            config: Arc::new(config),
            router,
            connectors,
        })
    }

    /// Assemble a snapshot from parts built elsewhere.
    pub fn from_parts(config: Configuration, router: Router, connectors: ConnectorPool) -> Self {
        Self {
            config: Arc::new(config),
            router,
            connectors,
        }
    }

    /// The configuration this snapshot was built from, including skipped rules.
    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn connectors(&self) -> &ConnectorPool {
        &self.connectors
    }

    /// First route matching the request host and path.
    pub fn match_request(&self, host: &str, path: &str) -> Option<&Route> {
        self.router.match_request(host, path)
    }

    /// Connector for an upstream name.
    pub fn connector(&self, upstream: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(upstream)
    }
}
