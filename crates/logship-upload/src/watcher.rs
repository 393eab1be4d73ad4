//! Output directory watcher
//!
//! Wraps the `notify` crate to observe a single directory (non-recursive)
//! and forward a [`Trigger::FileChanged`] for every event that may mean a
//! file finished being written. Read-only and transient events are
//! dropped by [`is_change_signal`]; no coalescing happens here because the
//! coordinator already collapses overlapping triggers.
//!
//! ## Architecture
//!
//! ```text
//! inotify
//!    │
//!    ▼
//! DirectoryWatcher ──→ mpsc::Sender<Trigger> ──→ UploadCoordinator
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::Trigger;

// ============================================================================
// DirectoryWatcher
// ============================================================================

struct ActiveWatch {
    // Dropping the watcher removes the inotify watch
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

/// Watches the output directory and emits change triggers
///
/// [`start`](Self::start) replaces any previous watch and
/// [`stop`](Self::stop) is idempotent, so the coordinator can re-run its
/// setup from scratch at any time.
pub struct DirectoryWatcher {
    triggers: mpsc::Sender<Trigger>,
    active: Mutex<Option<ActiveWatch>>,
}

impl DirectoryWatcher {
    pub fn new(triggers: mpsc::Sender<Trigger>) -> Self {
        Self {
            triggers,
            active: Mutex::new(None),
        }
    }

    /// Starts watching `path`, replacing any previous watch
    ///
    /// # Errors
    /// Returns an error if the OS watcher cannot be created or the path
    /// cannot be watched (missing directory, inotify limit reached).
    pub fn start(&self, path: &Path) -> Result<()> {
        let tx = self.triggers.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_change_signal(&event.kind) {
                        return;
                    }
                    let path = event.paths.first().cloned();
                    debug!(kind = ?event.kind, path = ?path, "Directory change");
                    match tx.try_send(Trigger::FileChanged(path)) {
                        Ok(()) => {}
                        // Triggers are already queued; the coordinator only needs one
                        Err(mpsc::error::TrySendError::Full(_)) => {}
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            warn!("Trigger channel closed, dropping change event");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "Directory watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create directory watcher")?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))?;

        let previous = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(ActiveWatch {
                _watcher: watcher,
                path: path.to_path_buf(),
            });
        if let Some(previous) = previous {
            debug!(path = %previous.path.display(), "Replaced previous watch");
        }
        info!(path = %path.display(), "Watching output directory");
        Ok(())
    }

    /// Stops watching; does nothing when no watch is active
    pub fn stop(&self) {
        let previous = self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(previous) = previous {
            info!(path = %previous.path.display(), "Stopped watching output directory");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Directory currently watched
    pub fn watched_path(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|w| w.path.clone())
    }
}

// ============================================================================
// Event classification
// ============================================================================

/// Whether a raw event should raise a change trigger
///
/// Ignored: reads, opens, close without write, data modification (the
/// writer is still busy), renames in either direction and removals.
/// Everything else, including attribute changes, close after write,
/// creation and kinds the backend cannot classify, is a change signal.
pub fn is_change_signal(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        EventKind::Modify(ModifyKind::Data(_)) => false,
        EventKind::Modify(ModifyKind::Name(_)) => false,
        EventKind::Modify(_) => true,
        EventKind::Remove(_) => false,
        EventKind::Create(_) => true,
        EventKind::Any | EventKind::Other => true,
    }
}
