//! Shader directory watcher for hot reload
//!
//! Events arrive on the debouncer thread and are forwarded over a channel;
//! the host thread drains them between frames and decides whether to reload.

use anyhow::{Result, anyhow};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

/// Default debounce window
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// File extensions that trigger a reload
const RELOAD_EXTENSIONS: [&str; 2] = ["wgsl", "json"];

/// Event emitted for the shader directory
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A shader or scene file changed
    Changed(PathBuf),
    /// The watcher itself reported an error
    Error(String),
}

fn is_reload_trigger(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| RELOAD_EXTENSIONS.contains(&e))
}

/// Watches shader directories for changes
pub struct ShaderWatcher {
    debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<WatchEvent>,
    watched_dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl ShaderWatcher {
    /// Create a watcher; `debounce_ms` defaults to [`DEFAULT_DEBOUNCE_MS`]
    pub fn new(debounce_ms: Option<u64>) -> Result<Self> {
        let (tx, rx) = channel();
        let watched_dirs = Arc::new(Mutex::new(Vec::<PathBuf>::new()));
        let dirs = watched_dirs.clone();

        let debounce = Duration::from_millis(debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS));

        let debouncer = new_debouncer(
            debounce,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let watched = dirs.lock();
                    for event in events {
                        let in_watched_dir = watched.iter().any(|d| event.path.starts_with(d));
                        if in_watched_dir && is_reload_trigger(&event.path) {
                            let _ = tx.send(WatchEvent::Changed(event.path));
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(format!("watch error: {e:?}")));
                }
            },
        )
        .map_err(|e| anyhow!("failed to create file watcher: {e:?}"))?;

        Ok(Self {
            debouncer,
            receiver: rx,
            watched_dirs,
        })
    }

    /// Start watching `dir` (non-recursive)
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let canonical = dir
            .canonicalize()
            .map_err(|e| anyhow!("cannot watch {}: {e}", dir.display()))?;

        self.debouncer
            .watcher()
            .watch(&canonical, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("failed to watch {}: {e}", canonical.display()))?;

        let mut watched = self.watched_dirs.lock();
        if !watched.contains(&canonical) {
            watched.push(canonical.clone());
        }
        tracing::info!("watching shaders in {}", canonical.display());
        Ok(())
    }

    /// Directories currently watched
    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched_dirs.lock().clone()
    }

    /// Drain pending events and report whether any asks for a reload.
    ///
    /// Watcher errors are logged and otherwise ignored.
    pub fn reload_requested(&self) -> bool {
        let mut requested = false;
        for event in self.receiver.try_iter() {
            match event {
                WatchEvent::Changed(path) => {
                    tracing::debug!("shader file changed: {}", path.display());
                    requested = true;
                }
                WatchEvent::Error(message) => tracing::warn!("{message}"),
            }
        }
        requested
    }
}
