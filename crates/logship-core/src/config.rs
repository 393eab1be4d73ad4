//! Configuration module for logship.
//!
//! Typed configuration structs mapped to the YAML configuration file, with
//! loading, validation, defaults, and a builder for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::policy::{
    parse_share_interval, Credentials, Endpoint, HostKeyPolicy, TransportKind, UploadPolicy,
};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for logship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upload: UploadConfig,
    pub watch: WatchConfig,
    pub transfer: TransferConfig,
    pub share: ShareConfig,
    pub logging: LoggingConfig,
    pub notifications: NotificationsConfig,
}

/// User upload preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Master switch for all upload triggers.
    pub enabled: bool,
    /// Minutes between interval triggers, stored as text. Blank, zero or
    /// non-numeric values mean 60.
    pub share_interval: String,
    /// `FTP`, `FTPS` or `SFTP`.
    pub transport: TransportKind,
    /// Server address: `host`, `host:port` or a URL.
    pub url: String,
    /// Explicit port, overriding any port in `url`.
    pub port: Option<u16>,
    pub login: String,
    pub password: String,
    /// Remote directory files are stored into.
    pub remote_path: String,
    /// SFTP host key handling: `strict` or `accept_any`.
    pub host_key_policy: HostKeyPolicy,
    /// known_hosts file for `strict`; `~/.ssh/known_hosts` when unset.
    pub known_hosts: Option<PathBuf>,
}

/// Output directory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory the producer writes `.json` / `.txt` files into.
    pub directory: PathBuf,
}

/// Transfer engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Fixed delay between a failed sub-session and the next one.
    pub retry_backoff_ms: u64,
    /// Failed sub-sessions a single file may cause before the class is
    /// left for the next job. Unset retries until the queue drains.
    pub file_attempt_limit: Option<u32>,
    /// TCP connect timeout for every transport.
    pub connect_timeout_secs: u64,
}

/// Manual-share hook run on every interval fire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Shell command; nothing runs when unset.
    pub command: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

/// User notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Send desktop notifications over D-Bus in addition to logging.
    pub desktop: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/logship/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("logship")
            .join("config.yaml")
    }

    /// Policy snapshot for the upload engine.
    pub fn upload_policy(&self, last_fire_epoch_millis: i64) -> UploadPolicy {
        let upload = &self.upload;
        UploadPolicy {
            enabled: upload.enabled,
            interval_minutes: parse_share_interval(&upload.share_interval),
            last_fire_epoch_millis,
            transport: upload.transport,
            endpoint_url: upload.url.clone(),
            port: upload.port,
            credentials: Credentials::new(upload.login.clone(), upload.password.clone()),
            remote_path: upload.remote_path.clone(),
            host_key_policy: upload.host_key_policy,
            known_hosts: upload.known_hosts.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            share_interval: "60".to_string(),
            transport: TransportKind::Ftp,
            url: String::new(),
            port: None,
            login: String::new(),
            password: String::new(),
            remote_path: String::new(),
            host_key_policy: HostKeyPolicy::Strict,
            known_hosts: None,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("logship")
                .join("outbox"),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 1500,
            file_attempt_limit: None,
            connect_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { desktop: true }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.file_attempt_limit"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Blank server
    /// settings are only reported while uploads are enabled; the engine
    /// rejects them again at job start.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- upload ---
        let interval = self.upload.share_interval.trim();
        if !interval.is_empty() && !matches!(interval.parse::<u64>(), Ok(n) if n > 0) {
            errors.push(ValidationError::new(
                "upload.share_interval",
                format!("'{interval}' is not a positive number of minutes; 60 will be used"),
            ));
        }
        if self.upload.port == Some(0) {
            errors.push(ValidationError::new("upload.port", "must be greater than 0"));
        }
        if self.upload.enabled {
            if self.upload.url.trim().is_empty() {
                errors.push(ValidationError::new("upload.url", "must be set"));
            } else if let Err(e) =
                Endpoint::parse(&self.upload.url, self.upload.transport, self.upload.port)
            {
                errors.push(ValidationError::new("upload.url", e.to_string()));
            }
            if self.upload.login.trim().is_empty() {
                errors.push(ValidationError::new("upload.login", "must be set"));
            }
            if self.upload.password.trim().is_empty() {
                errors.push(ValidationError::new("upload.password", "must be set"));
            }
            if self.upload.remote_path.trim().is_empty() {
                errors.push(ValidationError::new("upload.remote_path", "must be set"));
            }
        }
        if let Some(known_hosts) = &self.upload.known_hosts {
            if self.upload.transport == TransportKind::Sftp
                && self.upload.host_key_policy == HostKeyPolicy::Strict
                && !known_hosts.exists()
            {
                errors.push(ValidationError::new(
                    "upload.known_hosts",
                    format!("file does not exist: {}", known_hosts.display()),
                ));
            }
        }

        // --- watch ---
        if self.watch.directory.as_os_str().is_empty() {
            errors.push(ValidationError::new("watch.directory", "must be set"));
        }

        // --- transfer ---
        if self.transfer.file_attempt_limit == Some(0) {
            errors.push(ValidationError::new(
                "transfer.file_attempt_limit",
                "must be greater than 0",
            ));
        }
        if self.transfer.connect_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "transfer.connect_timeout_secs",
                "must be greater than 0",
            ));
        }

        // --- share ---
        if matches!(&self.share.command, Some(cmd) if cmd.trim().is_empty()) {
            errors.push(ValidationError::new(
                "share.command",
                "must not be blank; remove the key to disable the hook",
            ));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use logship_core::config::ConfigBuilder;
/// use logship_core::domain::TransportKind;
///
/// let config = ConfigBuilder::new()
///     .upload_enabled(true)
///     .upload_transport(TransportKind::Sftp)
///     .upload_url("files.example.com")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- upload ---

    pub fn upload_enabled(mut self, enabled: bool) -> Self {
        self.config.upload.enabled = enabled;
        self
    }

    pub fn upload_share_interval(mut self, minutes: impl Into<String>) -> Self {
        self.config.upload.share_interval = minutes.into();
        self
    }

    pub fn upload_transport(mut self, transport: TransportKind) -> Self {
        self.config.upload.transport = transport;
        self
    }

    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.upload.url = url.into();
        self
    }

    pub fn upload_port(mut self, port: u16) -> Self {
        self.config.upload.port = Some(port);
        self
    }

    pub fn upload_credentials(
        mut self,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.upload.login = login.into();
        self.config.upload.password = password.into();
        self
    }

    pub fn upload_remote_path(mut self, path: impl Into<String>) -> Self {
        self.config.upload.remote_path = path.into();
        self
    }

    pub fn upload_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.config.upload.host_key_policy = policy;
        self
    }

    pub fn upload_known_hosts(mut self, path: PathBuf) -> Self {
        self.config.upload.known_hosts = Some(path);
        self
    }

    // --- watch ---

    pub fn watch_directory(mut self, directory: PathBuf) -> Self {
        self.config.watch.directory = directory;
        self
    }

    // --- transfer ---

    pub fn transfer_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.transfer.retry_backoff_ms = ms;
        self
    }

    pub fn transfer_file_attempt_limit(mut self, n: u32) -> Self {
        self.config.transfer.file_attempt_limit = Some(n);
        self
    }

    pub fn transfer_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transfer.connect_timeout_secs = secs;
        self
    }

    // --- share ---

    pub fn share_command(mut self, command: impl Into<String>) -> Self {
        self.config.share.command = Some(command.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- notifications ---

    pub fn notifications_desktop(mut self, desktop: bool) -> Self {
        self.config.notifications.desktop = desktop;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn enabled_builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .upload_enabled(true)
            .upload_url("ftp.example.com")
            .upload_credentials("logger", "hunter2")
            .upload_remote_path("/incoming")
    }

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(!cfg.upload.enabled);
        assert_eq!(cfg.upload.share_interval, "60");
        assert_eq!(cfg.upload.transport, TransportKind::Ftp);
        assert_eq!(cfg.upload.host_key_policy, HostKeyPolicy::Strict);
        assert!(cfg.watch.directory.ends_with("logship/outbox"));
        assert_eq!(cfg.transfer.retry_backoff_ms, 1500);
        assert_eq!(cfg.transfer.file_attempt_limit, None);
        assert_eq!(cfg.transfer.connect_timeout_secs, 30);
        assert!(cfg.share.command.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.notifications.desktop);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
upload:
  enabled: true
  share_interval: "15"
  transport: SFTP
  url: sftp://files.example.com:2222
  login: logger
  password: hunter2
  remote_path: /upload/gnss
  host_key_policy: accept_any
watch:
  directory: /tmp/logship-out
transfer:
  retry_backoff_ms: 500
  file_attempt_limit: 5
share:
  command: "notify-send shared"
logging:
  level: debug
  json: true
notifications:
  desktop: false
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert!(cfg.upload.enabled);
        assert_eq!(cfg.upload.share_interval, "15");
        assert_eq!(cfg.upload.transport, TransportKind::Sftp);
        assert_eq!(cfg.upload.host_key_policy, HostKeyPolicy::AcceptAny);
        assert_eq!(cfg.watch.directory, PathBuf::from("/tmp/logship-out"));
        assert_eq!(cfg.transfer.retry_backoff_ms, 500);
        assert_eq!(cfg.transfer.file_attempt_limit, Some(5));
        // Unset keys keep their defaults
        assert_eq!(cfg.transfer.connect_timeout_secs, 30);
        assert_eq!(cfg.share.command.as_deref(), Some("notify-send shared"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(!cfg.notifications.desktop);
    }

    #[test]
    fn load_partial_yaml_uses_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"upload:\n  enabled: true\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert!(cfg.upload.enabled);
        assert_eq!(cfg.upload.share_interval, "60");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = enabled_builder().share_command("true").build();
        cfg.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }

    // -- Policy --

    #[test]
    fn upload_policy_maps_fields() {
        let cfg = enabled_builder()
            .upload_share_interval(" 0 ")
            .upload_port(2121)
            .build();
        let policy = cfg.upload_policy(1_700_000_000_000);
        assert!(policy.enabled);
        assert_eq!(policy.interval_minutes, 60);
        assert_eq!(policy.last_fire_epoch_millis, 1_700_000_000_000);
        assert_eq!(policy.credentials.username, "logger");
        assert_eq!(policy.remote_path, "/incoming");
        assert_eq!(policy.endpoint().unwrap().port, 2121);
    }

    // -- Validation --

    #[test]
    fn validate_reports_blank_server_settings_when_enabled() {
        let cfg = ConfigBuilder::new().upload_enabled(true).build();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"upload.url".to_string()));
        assert!(fields.contains(&"upload.login".to_string()));
        assert!(fields.contains(&"upload.password".to_string()));
        assert!(fields.contains(&"upload.remote_path".to_string()));
    }

    #[test]
    fn validate_accepts_complete_enabled_config() {
        assert!(enabled_builder().build_validated().is_ok());
    }

    #[test]
    fn validate_catches_bad_share_interval() {
        let cfg = ConfigBuilder::new().upload_share_interval("hourly").build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "upload.share_interval"));

        // Blank is a documented way to ask for the default
        let cfg = ConfigBuilder::new().upload_share_interval("").build();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_catches_zero_transfer_values() {
        let cfg = ConfigBuilder::new()
            .transfer_file_attempt_limit(0)
            .transfer_connect_timeout_secs(0)
            .build();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"transfer.file_attempt_limit".to_string()));
        assert!(fields.contains(&"transfer.connect_timeout_secs".to_string()));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let errors = ConfigBuilder::new().logging_level("verbose").build().validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "logging.level");
        assert!(errors[0].message.contains("verbose"));
    }

    #[test]
    fn validate_catches_missing_known_hosts() {
        let cfg = enabled_builder()
            .upload_transport(TransportKind::Sftp)
            .upload_known_hosts(PathBuf::from("/nonexistent/known_hosts"))
            .build();
        assert!(cfg.validate().iter().any(|e| e.field == "upload.known_hosts"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::new("upload.url", "must be set");
        assert_eq!(err.to_string(), "upload.url: must be set");
    }
}
