//! Configuration source watcher for hot reload.
//!
//! The watcher never loads configuration itself. It only emits a reload
//! notification; the supervisor then validates the sources and rebuilds the
//! service, exactly as it does for SIGHUP.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{ConfigSources, STDIN_PATH};

/// Watches every file and directory named by a [`ConfigSources`].
pub struct ConfigWatcher {
    targets: Vec<PathBuf>,
    reload_tx: mpsc::Sender<()>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for reload notifications. The
    /// channel holds a single pending notification; bursts of filesystem
    /// events collapse into one reload.
    pub fn new(sources: &ConfigSources) -> (Self, mpsc::Receiver<()>) {
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let watcher = Self {
            targets: watch_targets(sources),
            reload_tx,
        };
        (watcher, reload_rx)
    }

    /// Paths that will be watched.
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    /// Start watching in a background thread.
    ///
    /// Dropping the returned watcher stops notifications.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.reload_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_reload_event(&event) {
                        tracing::info!(paths = ?event.paths, "Config change detected");
                        // full channel means a reload is already queued
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for target in &self.targets {
            watcher.watch(target, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(targets = ?self.targets, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_targets(sources: &ConfigSources) -> Vec<PathBuf> {
    sources
        .paths
        .iter()
        .filter(|path| path.as_str() != STDIN_PATH)
        .map(PathBuf::from)
        .chain(sources.directories.iter().cloned())
        .collect()
}

/// Whether a filesystem event should trigger a reload.
pub fn is_reload_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}
