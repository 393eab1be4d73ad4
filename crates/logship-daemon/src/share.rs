//! Manual-share hook that runs a configured shell command

use tokio::process::Command;
use tracing::{info, warn};

use logship_upload::ShareHook;

/// Runs `sh -c <command>` on every interval fire
pub struct CommandShareHook {
    command: String,
}

impl CommandShareHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Runs the command and reports whether it exited successfully
    pub async fn run(&self) -> bool {
        match Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .status()
            .await
        {
            Ok(status) if status.success() => {
                info!(command = %self.command, "Share command finished");
                true
            }
            Ok(status) => {
                warn!(command = %self.command, status = %status, "Share command failed");
                false
            }
            Err(e) => {
                warn!(command = %self.command, error = %e, "Share command could not be started");
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl ShareHook for CommandShareHook {
    async fn share(&self) {
        self.run().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        assert!(CommandShareHook::new("true").run().await);
    }

    #[tokio::test]
    async fn test_failing_command() {
        assert!(!CommandShareHook::new("exit 3").run().await);
    }

    #[tokio::test]
    async fn test_command_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("shared");
        let hook = CommandShareHook::new(format!("touch '{}'", marker.display()));
        hook.share().await;
        assert!(marker.exists());
    }
}
