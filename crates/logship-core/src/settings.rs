//! File-backed settings store
//!
//! [`FileSettingsStore`] is the default [`ISettingsStore`] adapter. User
//! preferences come from the YAML configuration file; the interval
//! scheduler's last fire time lives in a small JSON state file so that
//! rewriting it never touches the user's configuration.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::policy::UploadPolicy;
use crate::ports::settings::{ISettingsStore, SettingKey};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Values written by the agent itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    last_timer_fire_ms: i64,
}

/// Settings store over a YAML config file and a JSON state file
pub struct FileSettingsStore {
    config_path: Option<PathBuf>,
    state_path: PathBuf,
    config: RwLock<Config>,
    state: Mutex<PersistedState>,
    changes: broadcast::Sender<SettingKey>,
}

impl FileSettingsStore {
    /// Opens the store, reading both files
    ///
    /// A missing config file yields the default configuration and a missing
    /// state file yields a last fire time of zero. Files that exist but
    /// cannot be parsed are errors.
    pub fn open(config_path: &Path, state_path: &Path) -> anyhow::Result<Self> {
        let config = if config_path.exists() {
            Config::load(config_path)
                .with_context(|| format!("failed to load {}", config_path.display()))?
        } else {
            info!(path = %config_path.display(), "No configuration file, using defaults");
            Config::default()
        };
        let state = read_state(state_path)?;

        let mut store = Self::from_config(config, state_path.to_path_buf());
        store.config_path = Some(config_path.to_path_buf());
        store.state = Mutex::new(state);
        Ok(store)
    }

    /// Creates a store around an in-memory configuration
    ///
    /// [`reload`](Self::reload) is unavailable; the state file is still
    /// written by [`ISettingsStore::set_last_timer_fire`].
    pub fn from_config(config: Config, state_path: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            config_path: None,
            state_path,
            config: RwLock::new(config),
            state: Mutex::new(PersistedState::default()),
            changes,
        }
    }

    /// Default location of the state file
    ///
    /// Typically `$XDG_DATA_HOME/logship/state.json` on Linux.
    pub fn default_state_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("logship")
            .join("state.json")
    }

    /// Current configuration
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Re-reads the config file and publishes one change per modified key
    pub fn reload(&self) -> anyhow::Result<Vec<SettingKey>> {
        let path = self
            .config_path
            .as_deref()
            .context("settings store has no config file to reload")?;
        let fresh = if path.exists() {
            Config::load(path).with_context(|| format!("failed to load {}", path.display()))?
        } else {
            Config::default()
        };
        Ok(self.replace(fresh))
    }

    /// Applies an in-memory change and publishes the modified keys
    ///
    /// Nothing is written to disk.
    pub fn update(&self, apply: impl FnOnce(&mut Config)) -> Vec<SettingKey> {
        let mut next = self.config();
        apply(&mut next);
        self.replace(next)
    }

    fn replace(&self, next: Config) -> Vec<SettingKey> {
        let changed = {
            let mut current = self.config.write().unwrap_or_else(|e| e.into_inner());
            let changed = diff_keys(&current, &next);
            *current = next;
            changed
        };
        for key in &changed {
            debug!(key = %key, "Setting changed");
            // No receivers is not an error
            let _ = self.changes.send(*key);
        }
        changed
    }

    fn last_fire(&self) -> i64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_timer_fire_ms
    }
}

#[async_trait::async_trait]
impl ISettingsStore for FileSettingsStore {
    fn policy(&self) -> UploadPolicy {
        let last_fire = self.last_fire();
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .upload_policy(last_fire)
    }

    async fn set_last_timer_fire(&self, epoch_millis: i64) -> anyhow::Result<()> {
        let json = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.last_timer_fire_ms = epoch_millis;
            serde_json::to_vec_pretty(&*state)?
        };

        if let Some(parent) = self.state_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&self.state_path, json)
            .await
            .with_context(|| format!("failed to write {}", self.state_path.display()))?;

        let _ = self.changes.send(SettingKey::LastTimerFire);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingKey> {
        self.changes.subscribe()
    }
}

fn read_state(path: &Path) -> anyhow::Result<PersistedState> {
    if !path.exists() {
        return Ok(PersistedState::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Keys whose effective value differs between two configurations
///
/// The share interval is compared after parsing, so rewriting `"60"` as
/// `" 60"` or as a blank value is not a change.
pub fn diff_keys(old: &Config, new: &Config) -> Vec<SettingKey> {
    let (a, b) = (&old.upload, &new.upload);
    let mut changed = Vec::new();
    if a.enabled != b.enabled {
        changed.push(SettingKey::UploadEnabled);
    }
    if crate::domain::parse_share_interval(&a.share_interval)
        != crate::domain::parse_share_interval(&b.share_interval)
    {
        changed.push(SettingKey::ShareInterval);
    }
    if a.transport != b.transport {
        changed.push(SettingKey::Transport);
    }
    if a.url != b.url || a.port != b.port {
        changed.push(SettingKey::EndpointUrl);
    }
    if a.login != b.login {
        changed.push(SettingKey::Login);
    }
    if a.password != b.password {
        changed.push(SettingKey::Secret);
    }
    if a.remote_path != b.remote_path {
        changed.push(SettingKey::RemotePath);
    }
    if a.host_key_policy != b.host_key_policy || a.known_hosts != b.known_hosts {
        changed.push(SettingKey::HostKeyPolicy);
    }
    changed
}
