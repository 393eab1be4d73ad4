//! Settings store port (driven/secondary port)
//!
//! The settings collaborator owns the user's upload preferences. The
//! upload engine reads [`UploadPolicy`] snapshots, writes exactly one
//! value (the interval scheduler's last fire time), and reacts to change
//! notifications keyed by [`SettingKey`].

use tokio::sync::broadcast;

use crate::domain::policy::UploadPolicy;

/// Name of an individual setting, used in change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    UploadEnabled,
    ShareInterval,
    Transport,
    EndpointUrl,
    Login,
    Secret,
    RemotePath,
    HostKeyPolicy,
    LastTimerFire,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::UploadEnabled => "upload.enabled",
            SettingKey::ShareInterval => "upload.share_interval",
            SettingKey::Transport => "upload.transport",
            SettingKey::EndpointUrl => "upload.url",
            SettingKey::Login => "upload.login",
            SettingKey::Secret => "upload.password",
            SettingKey::RemotePath => "upload.remote_path",
            SettingKey::HostKeyPolicy => "upload.host_key_policy",
            SettingKey::LastTimerFire => "state.last_timer_fire",
        }
    }

    /// Whether a change to this key requires re-running the trigger setup
    ///
    /// Only the master switch and the share interval do; every other
    /// setting is read fresh by the next job.
    pub fn requires_resetup(&self) -> bool {
        matches!(self, SettingKey::UploadEnabled | SettingKey::ShareInterval)
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port trait for the settings collaborator
#[async_trait::async_trait]
pub trait ISettingsStore: Send + Sync {
    /// Current policy snapshot
    fn policy(&self) -> UploadPolicy;

    /// Persists the interval scheduler's last fire time
    async fn set_last_timer_fire(&self, epoch_millis: i64) -> anyhow::Result<()>;

    /// Subscribes to change notifications
    ///
    /// One message is published per changed key.
    fn subscribe(&self) -> broadcast::Receiver<SettingKey>;
}
