//! Transfer engine - sequential, fault-tolerant upload of a queue snapshot
//!
//! ## Job flow
//!
//! ```text
//! validate policy ──✗──→ Aborted (configuration error, no attempt)
//!       │
//! snapshot directory ──✗──→ Aborted (local I/O)
//!       │
//! for class in [json, txt]:
//!     while files remain:
//!         sub-session: connect → authenticate → cd → put/delete each file → close
//!         on failure: charge the head file, wait retry_backoff, resume
//! ```
//!
//! A file is deleted locally only after the transport confirmed the put.
//! A put failure ends the current sub-session but never the other class.
//! After a failed sub-session the next one starts again from the first
//! file not yet uploaded, so files always leave in sorted order. The loop
//! ends when the class is empty or the job is cancelled. With an
//! operator-set `file_attempt_limit`, a head file that reaches the limit
//! ends its class for this job; it and everything after it stay on disk.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use logship_core::config::TransferConfig;
use logship_core::domain::{
    ExtensionClass, FileQueueEntry, FileReport, FileResult, JobReport, TransportError,
    TransportStage, UploadError, UploadPolicy,
};
use logship_core::ports::{INotificationService, ITransport, ITransportFactory, SessionTarget};

use crate::queue;

const ACTIVITY_TITLE: &str = "Uploading files";
const ACTIVITY_ICON: &str = "cloud-upload";

// ============================================================================
// TransferOptions
// ============================================================================

/// Retry tuning for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Fixed delay between a failed sub-session and the next
    pub retry_backoff: Duration,
    /// Failed sub-sessions the head file may cause before its class is
    /// left for the next job; `None` retries until the queue drains
    pub file_attempt_limit: Option<u32>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(1500),
            file_attempt_limit: None,
        }
    }
}

impl From<&TransferConfig> for TransferOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            file_attempt_limit: config.file_attempt_limit.map(|n| n.max(1)),
        }
    }
}

// ============================================================================
// TransferEngine
// ============================================================================

/// Runs upload jobs against a transport factory
pub struct TransferEngine {
    factory: Arc<dyn ITransportFactory>,
    notifier: Arc<dyn INotificationService>,
    options: TransferOptions,
}

struct Pending {
    entry: FileQueueEntry,
    failed_sessions: u32,
}

/// What one sub-session achieved, in queue order
struct SessionOutcome {
    results: Vec<FileResult>,
    failure: Option<TransportError>,
}

impl TransferEngine {
    pub fn new(
        factory: Arc<dyn ITransportFactory>,
        notifier: Arc<dyn INotificationService>,
        options: TransferOptions,
    ) -> Self {
        Self {
            factory,
            notifier,
            options,
        }
    }

    pub fn options(&self) -> TransferOptions {
        self.options
    }

    /// Runs one job over a fresh snapshot of `directory`
    ///
    /// Never fails: every error ends up in the returned report and is
    /// reported through the notification service. Cancelling `cancel`
    /// stops the job at the next backoff point; a session already in
    /// flight runs to completion or to its next failure.
    #[instrument(skip_all, fields(job = tracing::field::Empty, transport = %policy.transport))]
    pub async fn run_job(
        &self,
        policy: &UploadPolicy,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> JobReport {
        let started = Instant::now();
        let mut report = JobReport::new();
        tracing::Span::current().record("job", tracing::field::display(report.id));

        if let Err(e) = self
            .notifier
            .notify_foreground_activity(ACTIVITY_TITLE, ACTIVITY_ICON)
            .await
        {
            debug!(error = %e, "Failed to raise activity notification");
        }

        self.run_classes(policy, directory, cancel, &mut report).await;

        if let Err(e) = self.notifier.clear_foreground_activity().await {
            debug!(error = %e, "Failed to clear activity notification");
        }

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            outcome = ?report.outcome,
            uploaded = report.uploaded_count(),
            failed = report.failed_count(),
            sessions = report.sessions,
            duration_ms = report.duration_ms,
            "Upload job finished"
        );
        report
    }

    async fn run_classes(
        &self,
        policy: &UploadPolicy,
        directory: &Path,
        cancel: &CancellationToken,
        report: &mut JobReport,
    ) {
        let target = match self.prepare(policy) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Upload job rejected");
                self.notify_error(&e).await;
                report.abort(e.to_string());
                return;
            }
        };

        let mut snapshot = match queue::snapshot(directory).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let e = UploadError::local_io(directory, e);
                warn!(error = %e, "Cannot list output directory");
                self.notify_error(&e).await;
                report.abort(e.to_string());
                return;
            }
        };
        info!(
            json = snapshot.json.len(),
            txt = snapshot.text.len(),
            "Queue snapshot taken"
        );

        for class in ExtensionClass::ALL {
            let entries = snapshot.take(class);
            if entries.is_empty() {
                continue;
            }
            if let Err(reason) = self
                .transfer_class(policy, &target, class, entries, cancel, report)
                .await
            {
                report.abort(reason);
                return;
            }
        }
    }

    /// Validates the policy and resolves where sessions go
    fn prepare(&self, policy: &UploadPolicy) -> Result<SessionTarget, UploadError> {
        policy.validate_for_transfer()?;
        let endpoint = policy.endpoint()?;
        Ok(SessionTarget {
            endpoint,
            credentials: policy.credentials.clone(),
            remote_path: policy.remote_path.clone(),
        })
    }

    /// Retry loop over the remaining files of one class
    ///
    /// Returns `Err(reason)` only when the job must stop (cancellation).
    async fn transfer_class(
        &self,
        policy: &UploadPolicy,
        target: &SessionTarget,
        class: ExtensionClass,
        entries: Vec<FileQueueEntry>,
        cancel: &CancellationToken,
        report: &mut JobReport,
    ) -> Result<(), String> {
        let mut pending: VecDeque<Pending> = entries
            .into_iter()
            .map(|entry| Pending {
                entry,
                failed_sessions: 0,
            })
            .collect();

        while !pending.is_empty() {
            report.sessions += 1;
            let batch: Vec<FileQueueEntry> = pending.iter().map(|p| p.entry.clone()).collect();
            debug!(class = %class, files = batch.len(), session = report.sessions, "Opening session");

            let outcome = match self.factory.create(policy) {
                Ok(transport) => {
                    let target = target.clone();
                    tokio::task::spawn_blocking(move || run_session(transport, &target, batch))
                        .await
                        .unwrap_or_else(|e| SessionOutcome {
                            results: Vec::new(),
                            failure: Some(TransportError::new(
                                TransportStage::Close,
                                format!("session task aborted: {e}"),
                            )),
                        })
                }
                Err(e) => SessionOutcome {
                    results: Vec::new(),
                    failure: Some(e),
                },
            };

            for result in outcome.results {
                let Some(done) = pending.pop_front() else {
                    break;
                };
                report.files.push(FileReport {
                    name: done.entry.name,
                    class,
                    result,
                    attempts: done.failed_sessions + 1,
                });
            }

            let Some(failure) = outcome.failure else {
                continue;
            };
            let failure = UploadError::from(failure);
            warn!(class = %class, error = %failure, remaining = pending.len(), "Session failed");
            self.notify_error(&failure).await;

            let left = pending.len();
            let Some(head) = pending.front_mut() else {
                break;
            };
            head.failed_sessions += 1;
            if self
                .options
                .file_attempt_limit
                .is_some_and(|limit| head.failed_sessions >= limit)
            {
                warn!(
                    class = %class,
                    file = %head.entry.name,
                    attempts = head.failed_sessions,
                    left,
                    "Attempt limit reached, leaving class for the next job"
                );
                report.files.push(FileReport {
                    name: head.entry.name.clone(),
                    class,
                    result: FileResult::failed(failure.to_string()),
                    attempts: head.failed_sessions,
                });
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(class = %class, remaining = pending.len(), "Upload cancelled");
                    for left in pending.drain(..) {
                        report.files.push(FileReport {
                            name: left.entry.name,
                            class,
                            result: FileResult::failed("cancelled"),
                            attempts: left.failed_sessions,
                        });
                    }
                    return Err("cancelled".to_string());
                }
                _ = tokio::time::sleep(self.options.retry_backoff) => {}
            }
        }
        Ok(())
    }

    async fn notify_error(&self, error: &UploadError) {
        let message = format!("Upload failed: {error}");
        if let Err(e) = self.notifier.notify_error(&message).await {
            debug!(error = %e, "Failed to deliver error notification");
        }
    }
}

// ============================================================================
// Blocking session
// ============================================================================

/// One connect/transfer/close cycle; runs on the blocking pool
fn run_session(
    mut transport: Box<dyn ITransport>,
    target: &SessionTarget,
    batch: Vec<FileQueueEntry>,
) -> SessionOutcome {
    let mut results = Vec::with_capacity(batch.len());
    let failure = transfer_files(transport.as_mut(), target, &batch, &mut results).err();
    transport.close();
    SessionOutcome { results, failure }
}

fn transfer_files(
    transport: &mut dyn ITransport,
    target: &SessionTarget,
    batch: &[FileQueueEntry],
    results: &mut Vec<FileResult>,
) -> Result<(), TransportError> {
    transport.connect(&target.endpoint)?;
    transport.authenticate(&target.credentials)?;
    transport.change_directory(&target.remote_path)?;

    for entry in batch {
        let mut file = match File::open(&entry.path) {
            Ok(file) => file,
            Err(e) => {
                let e = UploadError::local_io(&entry.path, e);
                warn!(file = %entry.name, error = %e, "Cannot read file, skipping");
                results.push(FileResult::failed(e.to_string()));
                continue;
            }
        };

        let bytes = transport.put(&mut file, &entry.name)?;
        drop(file);

        let deleted = match std::fs::remove_file(&entry.path) {
            Ok(()) => true,
            Err(e) => {
                // The server has the file; the next job uploads it again
                warn!(
                    file = %entry.name,
                    error = %UploadError::local_io(&entry.path, e),
                    "Uploaded but could not delete local file"
                );
                false
            }
        };
        info!(file = %entry.name, bytes, deleted, "Uploaded");
        results.push(FileResult::Uploaded { bytes, deleted });
    }
    Ok(())
}
