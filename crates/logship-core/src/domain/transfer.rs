//! Per-file and per-job transfer results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue::ExtensionClass;

/// Identifier of a single upload job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of one file within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileResult {
    /// The server accepted the file
    ///
    /// `deleted` is false when the local delete failed afterwards; the
    /// file will then be uploaded again by a later job.
    Uploaded { bytes: u64, deleted: bool },
    /// The file stays in the directory and is retried by the next job
    Failed { reason: String },
}

impl FileResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        FileResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, FileResult::Uploaded { .. })
    }
}

/// Outcome of one file, with the number of sessions that attempted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub name: String,
    pub class: ExtensionClass,
    pub result: FileResult,
    pub attempts: u32,
}

/// Terminal state of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every queued file reached a terminal state
    Completed,
    /// The job stopped early (configuration error, unreadable directory, cancellation)
    Aborted { reason: String },
}

/// Summary of an upload job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub id: JobId,
    pub started_at: DateTime<Utc>,
    pub outcome: JobOutcome,
    pub files: Vec<FileReport>,
    /// Number of sub-sessions opened across all classes
    pub sessions: u32,
    pub duration_ms: u64,
}

impl JobReport {
    pub fn new() -> Self {
        Self {
            id: JobId::new(),
            started_at: Utc::now(),
            outcome: JobOutcome::Completed,
            files: Vec::new(),
            sessions: 0,
            duration_ms: 0,
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.outcome = JobOutcome::Aborted {
            reason: reason.into(),
        };
    }

    pub fn uploaded_count(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_uploaded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.len() - self.uploaded_count()
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == JobOutcome::Completed
    }
}

impl Default for JobReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = JobReport::new();
        report.files.push(FileReport {
            name: "a.json".into(),
            class: ExtensionClass::Json,
            result: FileResult::Uploaded {
                bytes: 10,
                deleted: true,
            },
            attempts: 1,
        });
        report.files.push(FileReport {
            name: "b.json".into(),
            class: ExtensionClass::Json,
            result: FileResult::failed("put failed: 451"),
            attempts: 3,
        });
        assert_eq!(report.uploaded_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.is_completed());

        report.abort("cancelled");
        assert!(!report.is_completed());
    }

    #[test]
    fn test_file_result_serializes_tagged() {
        let json = serde_json::to_value(FileResult::failed("boom")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");
    }
}
