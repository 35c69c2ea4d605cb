//! Shared handle to the serving snapshot.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::loader::{load_config, LoadError};
use crate::config::schema::Configuration;
use crate::observability::metrics::{self, ReloadOutcome};
use crate::runtime::snapshot::{ApplyError, Snapshot};
use crate::upstream::ConnectorOptions;

/// Why a reload left the serving snapshot unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Cloneable handle held by the request path and the reload path.
///
/// Readers take one snapshot per request with [`ProxyContext::current`].
/// Writers build a complete snapshot first and publish it in one swap, so a
/// request never sees rules from one configuration and connectors from another.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    snapshot: Arc<ArcSwap<Snapshot>>,
    options: Arc<ConnectorOptions>,
    reloads: Arc<AtomicU64>,
}

impl ProxyContext {
    /// Context serving the empty snapshot until something is applied.
    pub fn new(options: ConnectorOptions) -> Self {
        Self::with_snapshot(Snapshot::empty(), options)
    }

    pub fn with_snapshot(snapshot: Snapshot, options: ConnectorOptions) -> Self {
        metrics::record_rules(snapshot.router().len());
        Self {
            snapshot: Arc::new(ArcSwap::from_pointee(snapshot)),
            options: Arc::new(options),
            reloads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The snapshot serving right now.
    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    /// Replace the serving snapshot. In-flight requests keep the one they loaded.
    pub fn publish(&self, snapshot: Snapshot) {
        metrics::record_rules(snapshot.router().len());
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Build a snapshot for `config` and publish it.
    ///
    /// On error nothing is published and the previous snapshot keeps serving.
    pub fn apply(&self, config: Configuration) -> Result<(), ApplyError> {
        match Snapshot::build(config, &self.options) {
            Ok(snapshot) => {
                tracing::info!(
                    rules = snapshot.router().len(),
                    upstreams = snapshot.connectors().len(),
                    "Configuration applied"
                );
                self.publish(snapshot);
                metrics::record_reload(ReloadOutcome::Applied);
                Ok(())
            }
            Err(e) => {
                metrics::record_reload(ReloadOutcome::Rejected);
                Err(e)
            }
        }
    }

    /// Number of file reloads attempted, successful or not.
    pub fn reloads(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    /// Load the configuration file at `path` and apply it.
    pub fn reload_from(&self, path: &Path) -> Result<(), ReloadError> {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        let config = match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                metrics::record_reload(ReloadOutcome::Rejected);
                return Err(e.into());
            }
        };
        self.apply(config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use std::io::Write;

    const ONE_RULE: &str = r#"
upstreams:
  - name: a
    host: a.internal
rules:
  - path: /
    upstream: a
"#;

    #[tokio::test]
    async fn apply_publishes_new_snapshot() {
        let context = ProxyContext::new(ConnectorOptions::default());
        let before = context.current();
        assert!(before.router().is_empty());

        context.apply(parse_config(ONE_RULE).unwrap()).unwrap();

        let after = context.current();
        assert_eq!(after.router().len(), 1);
        // The old handle is untouched.
        assert!(before.router().is_empty());
    }

    #[tokio::test]
    async fn failed_apply_keeps_previous_snapshot() {
        let context = ProxyContext::new(ConnectorOptions::default());
        context.apply(parse_config(ONE_RULE).unwrap()).unwrap();

        let bad = Configuration {
            upstreams: vec![crate::config::schema::Upstream {
                name: "a".into(),
                host: String::new(),
                ..Default::default()
            }],
            rules: vec![],
        };
        assert!(context.apply(bad).is_err());
        assert_eq!(context.current().router().len(), 1);
    }

    #[tokio::test]
    async fn reload_from_missing_file_is_rejected() {
        let context = ProxyContext::new(ConnectorOptions::default());
        let dir = tempfile::tempdir().unwrap();

        let err = context.reload_from(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ReloadError::Load(LoadError::NotFound { .. })));
        assert!(context.current().router().is_empty());
    }

    #[tokio::test]
    async fn reload_from_file_applies_it() {
        let context = ProxyContext::new(ConnectorOptions::default());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ONE_RULE.as_bytes()).unwrap();

        context.reload_from(file.path()).unwrap();
        assert!(context.current().connector("a").is_some());
    }

    #[tokio::test]
    async fn construction_reports_rule_count() {
        let config = parse_config(ONE_RULE).unwrap();
        let snapshot = Snapshot::build(config, &ConnectorOptions::default()).unwrap();

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _context = ::metrics::with_local_recorder(&recorder, || {
            ProxyContext::with_snapshot(snapshot, ConnectorOptions::default())
        });

        assert!(handle.render().contains("proxy_rules 1"));
    }

    #[tokio::test]
    async fn reload_attempts_are_counted_across_clones() {
        let context = ProxyContext::new(ConnectorOptions::default());
        let clone = context.clone();
        let dir = tempfile::tempdir().unwrap();

        let _ = clone.reload_from(&dir.path().join("absent.yaml"));
        let _ = context.reload_from(&dir.path().join("absent.yaml"));
        assert_eq!(context.reloads(), 2);
        assert_eq!(clone.reloads(), 2);
    }
}
