//! Upload-now command - run one job in the foreground
//!
//! Runs the transfer engine directly against the current settings, so it
//! works whether or not the agent is running. Ctrl+C stops the job at the
//! next retry wait.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use logship_core::domain::{FileResult, JobOutcome, JobReport};
use logship_core::ports::ISettingsStore;
use logship_core::settings::FileSettingsStore;

use crate::output::Output;
use crate::service::{build_engine, build_notifier, shutdown_signal};

#[derive(Debug, Args)]
pub struct UploadNowCommand {
    /// Upload even when uploads are disabled in the configuration
    #[arg(long)]
    force: bool,

    /// State file holding the last timer fire time
    #[arg(long)]
    state: Option<PathBuf>,
}

impl UploadNowCommand {
    pub async fn execute(&self, config_path: &Path, out: Output) -> Result<()> {
        let state_path = self
            .state
            .clone()
            .unwrap_or_else(FileSettingsStore::default_state_path);
        let settings = FileSettingsStore::open(config_path, &state_path)?;
        let config = settings.config();
        let policy = settings.policy();

        if !policy.enabled {
            if !self.force {
                out.error("Uploads are disabled; use --force to upload anyway");
                return Ok(());
            }
            out.warn("Uploads are disabled; uploading anyway");
        }

        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));

        let engine = build_engine(&config, build_notifier(&config).await);
        info!(directory = %config.watch.directory.display(), "Manual upload requested");
        let report = engine
            .run_job(&policy, &config.watch.directory, &cancel)
            .await;

        if out.is_json() {
            return out.value(&report);
        }
        match &report.outcome {
            JobOutcome::Completed => out.success(&summary(&report)),
            JobOutcome::Aborted { reason } => out.error(&format!("Upload aborted: {reason}")),
        }
        for line in file_lines(&report) {
            out.line(&line);
        }
        Ok(())
    }
}

fn summary(report: &JobReport) -> String {
    format!(
        "Uploaded {} file{}, {} failed, {} session{} in {} ms",
        report.uploaded_count(),
        if report.uploaded_count() == 1 { "" } else { "s" },
        report.failed_count(),
        report.sessions,
        if report.sessions == 1 { "" } else { "s" },
        report.duration_ms
    )
}

fn file_lines(report: &JobReport) -> Vec<String> {
    report
        .files
        .iter()
        .map(|file| match &file.result {
            FileResult::Uploaded { bytes, deleted: true } => {
                format!("{} - {bytes} bytes", file.name)
            }
            FileResult::Uploaded {
                bytes,
                deleted: false,
            } => format!("{} - {bytes} bytes, local copy kept", file.name),
            FileResult::Failed { reason } => {
                format!("{} - failed after {} attempt(s): {reason}", file.name, file.attempts)
            }
        })
        .collect()
}
