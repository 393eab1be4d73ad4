//! Upload policy, transport selection and endpoint parsing
//!
//! [`UploadPolicy`] is the read-only snapshot of user settings that a single
//! upload job runs against. It is produced by the settings collaborator
//! (see [`crate::ports::settings::ISettingsStore`]) and never mutated by
//! the upload engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::{DomainError, UploadError};

/// Share interval used when the setting is blank, zero or not a number
pub const DEFAULT_SHARE_INTERVAL_MINUTES: u64 = 60;

/// Parses the share interval setting (minutes, stored as text)
///
/// Leading and trailing whitespace is ignored. Blank, zero or non-numeric
/// values fall back to [`DEFAULT_SHARE_INTERVAL_MINUTES`].
pub fn parse_share_interval(raw: &str) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(minutes) if minutes > 0 => minutes,
        _ => DEFAULT_SHARE_INTERVAL_MINUTES,
    }
}

// ============================================================================
// TransportKind
// ============================================================================

/// Wire protocol used to reach the remote server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportKind {
    /// Plain FTP, passive mode
    #[default]
    #[serde(rename = "FTP", alias = "ftp")]
    Ftp,
    /// FTP with explicit TLS (AUTH TLS), passive mode
    #[serde(rename = "FTPS", alias = "ftps")]
    Ftps,
    /// SSH file transfer
    #[serde(rename = "SFTP", alias = "sftp")]
    Sftp,
}

impl TransportKind {
    /// Port used when neither the URL nor the configuration names one
    pub fn default_port(&self) -> u16 {
        match self {
            TransportKind::Ftp | TransportKind::Ftps => 21,
            TransportKind::Sftp => 22,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Ftp => "FTP",
            TransportKind::Ftps => "FTPS",
            TransportKind::Sftp => "SFTP",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HostKeyPolicy
// ============================================================================

/// How the SFTP adapter treats the server's host key
///
/// `AcceptAny` skips verification entirely. It exists for servers that
/// were previously reached without host key checking and must be chosen
/// explicitly in configuration; the adapter logs a warning on every
/// connection made under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Verify the host key against a known_hosts file
    #[default]
    Strict,
    /// Accept whatever key the server presents
    AcceptAny,
}

// ============================================================================
// Credentials
// ============================================================================

/// Login name and secret for the remote server
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Resolved host and port of the remote server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parses the configured server address
    ///
    /// Accepts `host`, `host:port`, or a URL such as `ftp://host:2121/`.
    /// An explicit `port_override` wins over a port in the address; when
    /// neither is present the transport's default port is used.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidEndpoint`] for blank input, an
    /// unparseable URL, or a URL without a host.
    pub fn parse(
        raw: &str,
        kind: TransportKind,
        port_override: Option<u16>,
    ) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::InvalidEndpoint("address is blank".into()));
        }

        let (host, port) = if raw.contains("://") {
            let url = Url::parse(raw)
                .map_err(|e| DomainError::InvalidEndpoint(format!("{raw}: {e}")))?;
            let host = url
                .host_str()
                .ok_or_else(|| DomainError::InvalidEndpoint(format!("{raw}: missing host")))?
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();
            (host, url.port())
        } else {
            match raw.rsplit_once(':') {
                // Bare IPv6 addresses contain several colons and carry no port
                Some((host, port)) if !host.contains(':') => {
                    let port = port.parse::<u16>().map_err(|_| {
                        DomainError::InvalidEndpoint(format!("{raw}: invalid port"))
                    })?;
                    (host.to_string(), Some(port))
                }
                _ => (raw.to_string(), None),
            }
        };

        if host.is_empty() {
            return Err(DomainError::InvalidEndpoint(format!("{raw}: missing host")));
        }

        Ok(Self {
            host,
            port: port_override
                .or(port)
                .unwrap_or_else(|| kind.default_port()),
        })
    }

    /// Address in a form accepted by `ToSocketAddrs`
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.address())
    }
}

// ============================================================================
// UploadPolicy
// ============================================================================

/// Snapshot of the user's upload settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Master switch; triggers are dropped while false
    pub enabled: bool,
    /// Period of the interval scheduler in minutes
    pub interval_minutes: u64,
    /// Wall-clock time of the last interval fire (Unix epoch, milliseconds)
    pub last_fire_epoch_millis: i64,
    /// Wire protocol
    pub transport: TransportKind,
    /// Server address as configured (host, host:port or URL)
    pub endpoint_url: String,
    /// Explicit port, overriding any port in `endpoint_url`
    pub port: Option<u16>,
    pub credentials: Credentials,
    /// Remote directory files are stored into
    pub remote_path: String,
    /// SFTP host key handling
    pub host_key_policy: HostKeyPolicy,
    /// known_hosts file used under [`HostKeyPolicy::Strict`]
    pub known_hosts: Option<std::path::PathBuf>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_SHARE_INTERVAL_MINUTES,
            last_fire_epoch_millis: 0,
            transport: TransportKind::default(),
            endpoint_url: String::new(),
            port: None,
            credentials: Credentials::default(),
            remote_path: String::new(),
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
        }
    }
}

impl UploadPolicy {
    /// Interval scheduler period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// Checks the fields a transfer cannot start without
    ///
    /// # Errors
    /// Returns [`UploadError::Configuration`] naming the first blank field
    /// among server address, login, password and remote folder.
    pub fn validate_for_transfer(&self) -> Result<(), UploadError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(UploadError::Configuration(
                "server address is not set".into(),
            ));
        }
        if self.credentials.username.trim().is_empty() {
            return Err(UploadError::Configuration("login is not set".into()));
        }
        if self.credentials.secret.trim().is_empty() {
            return Err(UploadError::Configuration("password is not set".into()));
        }
        if self.remote_path.trim().is_empty() {
            return Err(UploadError::Configuration(
                "remote folder path is not set".into(),
            ));
        }
        Ok(())
    }

    /// Resolves the configured address for the selected transport
    pub fn endpoint(&self) -> Result<Endpoint, DomainError> {
        Endpoint::parse(&self.endpoint_url, self.transport, self.port)
    }
}
