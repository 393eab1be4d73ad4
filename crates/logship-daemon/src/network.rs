//! Reachability sources for the connectivity monitor
//!
//! [`NetworkManagerReachability`] follows NetworkManager's global
//! `Connectivity` property over the system bus. Only `FULL` counts as
//! reachable: NetworkManager sets it after validating that the default
//! route actually reaches the internet. [`StaticReachability`] reports a
//! permanently available network for hosts without NetworkManager.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use logship_core::ports::{IReachabilitySource, ReachabilityEvent};

/// NM_CONNECTIVITY_NONE
const NM_CONNECTIVITY_NONE: u32 = 1;
/// NM_CONNECTIVITY_FULL
const NM_CONNECTIVITY_FULL: u32 = 4;

#[zbus::proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
trait NetworkManager {
    #[zbus(property)]
    fn connectivity(&self) -> zbus::Result<u32>;
}

/// Maps an `NMConnectivityState` value to a reachability event
///
/// `NONE` means the network went away; `UNKNOWN`, `PORTAL` and `LIMITED`
/// mean no validated internet-capable network exists right now.
pub fn connectivity_event(state: u32) -> ReachabilityEvent {
    match state {
        NM_CONNECTIVITY_FULL => ReachabilityEvent::Available,
        NM_CONNECTIVITY_NONE => ReachabilityEvent::Lost,
        _ => ReachabilityEvent::Unavailable,
    }
}

// ============================================================================
// NetworkManager
// ============================================================================

/// Reachability source backed by NetworkManager on the system bus
pub struct NetworkManagerReachability {
    connection: zbus::Connection,
}

impl NetworkManagerReachability {
    /// Connects to the system bus and checks that NetworkManager answers
    ///
    /// # Errors
    /// Returns an error if the system bus is unreachable or NetworkManager
    /// is not running.
    pub async fn connect() -> Result<Self> {
        let connection = zbus::Connection::system()
            .await
            .context("Failed to connect to the system bus")?;
        let proxy = NetworkManagerProxy::new(&connection)
            .await
            .context("Failed to create NetworkManager proxy")?;
        let state = proxy
            .connectivity()
            .await
            .context("NetworkManager did not report connectivity")?;
        info!(state, "Connected to NetworkManager");
        Ok(Self { connection })
    }

    async fn proxy(&self) -> Result<NetworkManagerProxy<'_>> {
        NetworkManagerProxy::new(&self.connection)
            .await
            .context("Failed to create NetworkManager proxy")
    }
}

#[async_trait::async_trait]
impl IReachabilitySource for NetworkManagerReachability {
    async fn probe(&self) -> Result<bool> {
        let state = self.proxy().await?.connectivity().await?;
        Ok(connectivity_event(state) == ReachabilityEvent::Available)
    }

    async fn run(&self, events: mpsc::Sender<ReachabilityEvent>) -> Result<()> {
        let proxy = self.proxy().await?;
        let mut changes = proxy.receive_connectivity_changed().await;
        debug!("Following NetworkManager connectivity changes");

        loop {
            let change = tokio::select! {
                _ = events.closed() => break,
                change = changes.next() => change,
            };
            let Some(change) = change else {
                warn!("NetworkManager connectivity stream ended");
                break;
            };
            let state = match change.get().await {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "Unreadable connectivity change");
                    continue;
                }
            };
            let event = connectivity_event(state);
            debug!(state, event = ?event, "NetworkManager connectivity changed");
            if events.send(event).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Static
// ============================================================================

/// Reachability source that always reports an available network
#[derive(Debug, Default)]
pub struct StaticReachability;

#[async_trait::async_trait]
impl IReachabilitySource for StaticReachability {
    async fn probe(&self) -> Result<bool> {
        Ok(true)
    }

    async fn run(&self, events: mpsc::Sender<ReachabilityEvent>) -> Result<()> {
        // Hold the subscription open until the monitor stops
        events.closed().await;
        Ok(())
    }
}
