//! Connector pool management.
//!
//! # Responsibilities
//! - Build one connector per configured upstream
//! - Look connectors up by upstream name

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::Upstream;
use crate::upstream::connector::{Connector, ConnectorError, ConnectorOptions, UpstreamConnector};

/// Connectors keyed by upstream name.
#[derive(Debug, Clone, Default)]
pub struct ConnectorPool {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorPool {
    /// Build connectors for every upstream. A duplicated name keeps the last definition.
    ///
    /// Fails on the first upstream that cannot be built; nothing is returned in that case.
    pub fn build(upstreams: &[Upstream], options: &ConnectorOptions) -> Result<Self, ConnectorError> {
        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();

        for upstream in upstreams {
            let connector = UpstreamConnector::build(upstream, options)?;
            if connectors
                .insert(upstream.name.clone(), Arc::new(connector))
                .is_some()
            {
                tracing::warn!(upstream = %upstream.name, "Duplicate upstream name, last definition wins");
            }
        }

        Ok(Self { connectors })
    }

    /// Assemble a pool from ready-made connectors, keyed by their names.
    pub fn from_connectors(connectors: impl IntoIterator<Item = Arc<dyn Connector>>) -> Self {
        Self {
            connectors: connectors
                .into_iter()
                .map(|c| (c.name().to_string(), c))
                .collect(),
        }
    }

    /// Select the connector for the given upstream name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        let connector = self.connectors.get(name).cloned();
        if connector.is_none() {
            tracing::debug!(upstream = %name, "Upstream not found in connector pool");
        }
        connector
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connectors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
