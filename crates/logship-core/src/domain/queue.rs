//! Queue entries derived from the output directory

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File class, decided by the file name suffix
///
/// Each class is queued and transferred independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionClass {
    Json,
    Text,
}

impl ExtensionClass {
    /// All classes, in the order jobs process them
    pub const ALL: [ExtensionClass; 2] = [ExtensionClass::Json, ExtensionClass::Text];

    pub fn suffix(&self) -> &'static str {
        match self {
            ExtensionClass::Json => ".json",
            ExtensionClass::Text => ".txt",
        }
    }

    /// Classifies a file name; `None` for names outside both classes
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| name.ends_with(class.suffix()))
    }
}

impl std::fmt::Display for ExtensionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionClass::Json => write!(f, "json"),
            ExtensionClass::Text => write!(f, "txt"),
        }
    }
}

/// A file eligible for upload, as seen when the snapshot was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileQueueEntry {
    /// Absolute local path
    pub path: PathBuf,
    /// File name, also used as the remote name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    pub class: ExtensionClass,
}

impl FileQueueEntry {
    /// Builds an entry for `path`, or `None` if its name is not in a class
    pub fn new(path: &Path, size: u64, modified: DateTime<Utc>) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let class = ExtensionClass::from_file_name(&name)?;
        Some(Self {
            path: path.to_path_buf(),
            name,
            size,
            modified,
            class,
        })
    }
}
