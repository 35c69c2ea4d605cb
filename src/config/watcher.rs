//! Configuration file watcher for hot reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::runtime::ProxyContext;

/// Timing of the reload sequence.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// Events arriving this soon after an accepted one are ignored.
    pub debounce: Duration,

    /// Delay between accepting an event and reading the file.
    pub settle: Duration,

    /// Capacity of the event queue between the notify thread and the worker.
    pub queue: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            settle: Duration::from_millis(200),
            queue: 16,
        }
    }
}

/// Watches the configuration file and applies every good write.
///
/// Dropping the watcher stops both the notification source and the worker.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    worker: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `path`. Must be called from within a Tokio runtime.
    ///
    /// The parent directory is watched so that replace-by-rename writes are seen.
    pub fn spawn(
        path: &Path,
        context: ProxyContext,
        settings: WatchSettings,
    ) -> Result<Self, notify::Error> {
        let path = path.to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());

        let (tx, rx) = mpsc::channel::<()>(settings.queue.max(1));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours {
                        // A full queue already holds a pending reload.
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let worker = tokio::spawn(reload_loop(path.clone(), context, settings, rx));

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(Self {
            path,
            _watcher: watcher,
            worker,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn reload_loop(
    path: PathBuf,
    context: ProxyContext,
    settings: WatchSettings,
    mut events: mpsc::Receiver<()>,
) {
    let mut last_accepted: Option<Instant> = None;

    while events.recv().await.is_some() {
        let now = Instant::now();
        if let Some(last) = last_accepted {
            if now.duration_since(last) < settings.debounce {
                tracing::trace!("Config change ignored inside quiet window");
                continue;
            }
        }
        last_accepted = Some(now);

        tracing::info!(path = %path.display(), "Config file change detected, reloading");
        tokio::time::sleep(settings.settle).await;

        // Everything queued during the settle delay is covered by this read.
        while events.try_recv().is_ok() {}

        let reload_path = path.clone();
        let reload_context = context.clone();
        let result =
            tokio::task::spawn_blocking(move || reload_context.reload_from(&reload_path)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration")
            }
            Err(e) => tracing::error!(error = %e, "Config reload task failed"),
        }
    }

    tracing::debug!("Config watcher stopped");
}
