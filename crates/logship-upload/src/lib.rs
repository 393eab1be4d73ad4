//! Logship Upload - Triggering, admission and transfer
//!
//! This crate decides *when* an upload runs and *how* it walks the queue:
//!
//! ```text
//! DirectoryWatcher ─┐
//! ConnectivityMonitor ─┼──→ Trigger ──→ UploadCoordinator ──→ job lane ──→ TransferEngine
//! IntervalScheduler ─┘        ▲                                              │
//!                        manual request                              ITransport (FTP/FTPS/SFTP)
//! ```
//!
//! - [`connectivity`] - live "internet reachable" cell fed by an OS source
//! - [`watcher`] - non-recursive directory watch emitting change triggers
//! - [`scheduler`] - recurring interval trigger with persisted last fire time
//! - [`queue`] - per-class queue snapshot of the output directory
//! - [`engine`] - sequential per-class upload with fixed-backoff retry
//! - [`coordinator`] - policy check, deduplication and the single job lane

use std::path::PathBuf;

pub mod connectivity;
pub mod coordinator;
pub mod engine;
pub mod queue;
pub mod scheduler;
pub mod watcher;

pub use connectivity::ConnectivityMonitor;
pub use coordinator::{Admission, CoordinatorStatus, LaneState, UploadCoordinator};
pub use engine::{TransferEngine, TransferOptions};
pub use queue::{snapshot, QueueSnapshot};
pub use scheduler::{IntervalScheduler, NoopShareHook, ShareHook};
pub use watcher::DirectoryWatcher;

/// A request to consider running an upload job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The watched directory changed; carries the first affected path
    FileChanged(Option<PathBuf>),
    /// Connectivity became available
    ConnectivityAvailable,
    /// The interval scheduler fired
    IntervalElapsed,
    /// Explicit user request
    Manual,
}

impl Trigger {
    /// Short name used in logs
    pub fn source(&self) -> &'static str {
        match self {
            Trigger::FileChanged(_) => "file_changed",
            Trigger::ConnectivityAvailable => "connectivity",
            Trigger::IntervalElapsed => "interval",
            Trigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.source())
    }
}
