//! Agent service - wires the settings store, engine and coordinator
//!
//! The service owns the connectivity monitor and the coordinator. It runs
//! until its cancellation token fires (SIGTERM or Ctrl+C) and reloads the
//! configuration file on SIGHUP; the settings store publishes what changed
//! and the coordinator re-runs its setup when needed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use logship_core::config::Config;
use logship_core::ports::{INotificationService, IReachabilitySource};
use logship_core::settings::FileSettingsStore;
use logship_transport::DefaultTransportFactory;
use logship_upload::{
    ConnectivityMonitor, CoordinatorStatus, NoopShareHook, ShareHook, TransferEngine,
    TransferOptions, UploadCoordinator,
};

use crate::network::{NetworkManagerReachability, StaticReachability};
use crate::notifier::{DesktopNotifier, LogNotifier};
use crate::share::CommandShareHook;

/// Builds the notifier the configuration asks for
///
/// Falls back to logging when no session bus is available.
pub async fn build_notifier(config: &Config) -> Arc<dyn INotificationService> {
    if !config.notifications.desktop {
        return Arc::new(LogNotifier);
    }
    match DesktopNotifier::connect().await {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            warn!(error = %e, "Desktop notifications unavailable, logging only");
            Arc::new(LogNotifier)
        }
    }
}

/// Builds the transfer engine from the transfer section
pub fn build_engine(config: &Config, notifier: Arc<dyn INotificationService>) -> TransferEngine {
    let factory = DefaultTransportFactory::new(Duration::from_secs(
        config.transfer.connect_timeout_secs.max(1),
    ));
    TransferEngine::new(
        Arc::new(factory),
        notifier,
        TransferOptions::from(&config.transfer),
    )
}

fn build_share_hook(config: &Config) -> Arc<dyn ShareHook> {
    match config.share.command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => Arc::new(CommandShareHook::new(command)),
        _ => Arc::new(NoopShareHook),
    }
}

/// Picks NetworkManager when it is reachable, a static source otherwise
pub async fn default_reachability() -> Arc<dyn IReachabilitySource> {
    match NetworkManagerReachability::connect().await {
        Ok(source) => Arc::new(source),
        Err(e) => {
            warn!(error = %e, "NetworkManager unavailable, assuming the network is always up");
            Arc::new(StaticReachability)
        }
    }
}

// ============================================================================
// AgentService
// ============================================================================

/// The running agent
pub struct AgentService {
    settings: Arc<FileSettingsStore>,
    connectivity: Arc<ConnectivityMonitor>,
    coordinator: UploadCoordinator,
    shutdown: CancellationToken,
}

impl AgentService {
    /// Opens the settings and wires every component
    ///
    /// Creates the output directory if it does not exist. Transfer options
    /// and the transport timeout are read once here; later reloads only
    /// affect the upload policy.
    pub async fn new(
        config_path: &Path,
        state_path: &Path,
        notifier: Arc<dyn INotificationService>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let settings = Arc::new(FileSettingsStore::open(config_path, state_path)?);
        let config = settings.config();

        for problem in config.validate() {
            warn!(field = %problem.field, "{}", problem.message);
        }

        let directory: PathBuf = config.watch.directory.clone();
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create {}", directory.display()))?;

        let connectivity = Arc::new(ConnectivityMonitor::new());
        let coordinator = UploadCoordinator::new(
            settings.clone(),
            build_engine(&config, notifier),
            Arc::clone(&connectivity),
            build_share_hook(&config),
            directory,
        );

        Ok(Self {
            settings,
            connectivity,
            coordinator,
            shutdown,
        })
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.coordinator.status()
    }

    /// Re-reads the configuration file
    pub fn reload(&self) {
        match self.settings.reload() {
            Ok(changed) if changed.is_empty() => info!("Configuration reloaded, nothing changed"),
            Ok(changed) => {
                let keys: Vec<&str> = changed.iter().map(|k| k.as_str()).collect();
                info!(changed = ?keys, "Configuration reloaded");
            }
            Err(e) => {
                let err_msg = format!("{e:#}");
                error!(error = %err_msg, "Configuration reload failed; keeping previous settings");
            }
        }
    }

    /// Runs until the shutdown token is cancelled
    pub async fn run(&self, reachability: Arc<dyn IReachabilitySource>) -> Result<()> {
        self.connectivity.start(reachability).await;
        self.coordinator.start().await;
        info!(enabled = self.status().enabled, "Agent running");

        #[cfg(unix)]
        let mut hangup =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
                .context("Failed to install SIGHUP handler")?;

        loop {
            #[cfg(unix)]
            let reload = hangup.recv();
            #[cfg(not(unix))]
            let reload = std::future::pending::<Option<()>>();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = reload => {
                    info!("Received SIGHUP");
                    self.reload();
                }
            }
        }

        self.coordinator.shutdown().await;
        self.connectivity.stop().await;
        info!("Agent stopped");
        Ok(())
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Cancels `token` on SIGTERM or SIGINT
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}
