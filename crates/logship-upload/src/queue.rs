//! Queue snapshot of the output directory
//!
//! A snapshot is computed fresh for every job. Per extension class it
//! holds the eligible files sorted by name, minus the most recently
//! modified file of that class, which the producer may still be writing.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use logship_core::domain::{ExtensionClass, FileQueueEntry};

/// Ordered upload queue, one list per class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub json: Vec<FileQueueEntry>,
    pub text: Vec<FileQueueEntry>,
}

impl QueueSnapshot {
    pub fn class(&self, class: ExtensionClass) -> &[FileQueueEntry] {
        match class {
            ExtensionClass::Json => &self.json,
            ExtensionClass::Text => &self.text,
        }
    }

    /// Moves one class's queue out of the snapshot
    pub fn take(&mut self, class: ExtensionClass) -> Vec<FileQueueEntry> {
        match class {
            ExtensionClass::Json => std::mem::take(&mut self.json),
            ExtensionClass::Text => std::mem::take(&mut self.text),
        }
    }

    pub fn len(&self) -> usize {
        self.json.len() + self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lists `directory` and builds the queue snapshot
///
/// Only regular, writable files whose names end in `.json` or `.txt` are
/// eligible; subdirectories are not descended into. The newest file of
/// each class is excluded, with ties on modification time going to the
/// greater name.
///
/// # Errors
/// Returns the I/O error if the directory cannot be listed.
pub async fn snapshot(directory: &Path) -> io::Result<QueueSnapshot> {
    let mut json = Vec::new();
    let mut text = Vec::new();

    let mut entries = tokio::fs::read_dir(directory).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        if metadata.permissions().readonly() {
            trace!(path = %path.display(), "Skipping read-only file");
            continue;
        }
        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(time) => time.into(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No modification time, skipping");
                continue;
            }
        };
        let Some(item) = FileQueueEntry::new(&path, metadata.len(), modified) else {
            continue;
        };
        match item.class {
            ExtensionClass::Json => json.push(item),
            ExtensionClass::Text => text.push(item),
        }
    }

    Ok(QueueSnapshot {
        json: order_class(json),
        text: order_class(text),
    })
}

/// Drops the newest entry and sorts the rest by name
fn order_class(mut entries: Vec<FileQueueEntry>) -> Vec<FileQueueEntry> {
    let newest = entries
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)))
        .map(|(i, _)| i);
    if let Some(i) = newest {
        let held = entries.swap_remove(i);
        trace!(file = %held.name, "Holding back newest file");
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}
