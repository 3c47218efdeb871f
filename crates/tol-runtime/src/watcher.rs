//! Config-file watching for running servers.
//!
//! The lifecycle controller watches a server's config file while its
//! process runs. This is an informational hook: changes are reported, no
//! restart policy is wired to them.

use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, Debouncer, new_debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Debounce window batching rapid successive saves into one event.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize config watcher: {0}")]
    Init(notify::Error),
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}

/// Events emitted by a [`ConfigWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched config file was modified on disk.
    Modified(PathBuf),
}

/// Debounced watcher over a single config file.
pub struct ConfigWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl ConfigWatcher {
    pub fn new(config_path: &Path, debounce_ms: u64) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |res: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    for event in events {
                        debug!(path = %event.path.display(), "Config file change detected");
                        if event_tx.send(WatchEvent::Modified(event.path)).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Config watch error");
                }
            },
        )
        .map_err(WatchError::Init)?;

        debouncer
            .watcher()
            .watch(config_path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: config_path.to_path_buf(),
                source,
            })?;

        debug!(path = %config_path.display(), "Watching server config file");
        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Receive the next watch event; `None` once the watcher is gone.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }
}
