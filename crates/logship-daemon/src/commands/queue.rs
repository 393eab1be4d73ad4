//! Queue command - show what the next job would upload

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use logship_core::config::Config;
use logship_core::domain::ExtensionClass;
use logship_upload::{snapshot, QueueSnapshot};

use crate::output::Output;

#[derive(Debug, Args)]
pub struct QueueCommand {}

impl QueueCommand {
    pub async fn execute(&self, config_path: &Path, out: Output) -> Result<()> {
        let config = Config::load_or_default(config_path);
        let directory = &config.watch.directory;
        let queue = snapshot(directory)
            .await
            .with_context(|| format!("Failed to list {}", directory.display()))?;

        if out.is_json() {
            return out.value(&serde_json::json!({
                "directory": directory.display().to_string(),
                "json": queue.json,
                "txt": queue.text,
            }));
        }

        out.success(&format!(
            "{} file{} queued in {}",
            queue.len(),
            if queue.len() == 1 { "" } else { "s" },
            directory.display()
        ));
        for line in describe(&queue) {
            out.line(&line);
        }
        Ok(())
    }
}

fn describe(queue: &QueueSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for class in ExtensionClass::ALL {
        for entry in queue.class(class) {
            lines.push(format!(
                "[{class}] {} ({} bytes, modified {})",
                entry.name,
                entry.size,
                entry.modified.format("%Y-%m-%d %H:%M:%S")
            ));
        }
    }
    lines
}
