//! Run command - start the agent in the foreground

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use logship_core::config::Config;
use logship_core::ports::IReachabilitySource;
use logship_core::settings::FileSettingsStore;

use crate::network::StaticReachability;
use crate::service::{build_notifier, default_reachability, shutdown_signal, AgentService};

#[derive(Debug, Default, Args)]
pub struct RunCommand {
    /// State file holding the last timer fire time
    #[arg(long)]
    state: Option<PathBuf>,

    /// Treat the network as always reachable instead of asking NetworkManager
    #[arg(long)]
    assume_online: bool,
}

impl RunCommand {
    pub async fn execute(&self, config_path: &Path) -> Result<()> {
        info!(config_path = %config_path.display(), "Logship agent starting (logshipd)");

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        let state_path = self
            .state
            .clone()
            .unwrap_or_else(FileSettingsStore::default_state_path);
        let notifier = build_notifier(&Config::load_or_default(config_path)).await;
        let service = AgentService::new(config_path, &state_path, notifier, shutdown).await?;

        let reachability: Arc<dyn IReachabilitySource> = if self.assume_online {
            Arc::new(StaticReachability)
        } else {
            default_reachability().await
        };

        let result = service.run(reachability).await;
        match &result {
            Ok(()) => info!("Logship agent shut down gracefully"),
            Err(e) => error!(error = %e, "Logship agent exiting with error"),
        }
        result
    }
}
