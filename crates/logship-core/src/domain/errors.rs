//! Domain error types
//!
//! This module defines the error taxonomy for upload jobs:
//! configuration problems (fatal, never retried), transport failures
//! (retried per sub-session) and local I/O failures (best effort).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Endpoint URL could not be parsed into host and port
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// The step of a transport session that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Connect,
    Authenticate,
    ChangeDirectory,
    Put,
    Close,
}

impl std::fmt::Display for TransportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportStage::Connect => "connect",
            TransportStage::Authenticate => "authenticate",
            TransportStage::ChangeDirectory => "change directory",
            TransportStage::Put => "put",
            TransportStage::Close => "close",
        };
        write!(f, "{}", s)
    }
}

/// A protocol-level failure reported by a transport adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{stage} failed: {message}")]
pub struct TransportError {
    /// The session step that failed
    pub stage: TransportStage,
    /// Adapter-specific description
    pub message: String,
}

impl TransportError {
    pub fn new(stage: TransportStage, message: impl std::fmt::Display) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

/// Errors that end or degrade an upload job
#[derive(Debug, Error)]
pub enum UploadError {
    /// A required setting is blank or malformed; the job is aborted without retry
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connect, authentication, directory change or put failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A local file could not be listed, read or deleted
    #[error("Local I/O error on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UploadError::LocalIo {
            path: path.into(),
            source,
        }
    }
}

impl From<DomainError> for UploadError {
    fn from(err: DomainError) -> Self {
        UploadError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::new(TransportStage::Put, "550 Permission denied");
        assert_eq!(err.to_string(), "put failed: 550 Permission denied");

        let err = TransportError::new(TransportStage::ChangeDirectory, "no such directory");
        assert_eq!(err.to_string(), "change directory failed: no such directory");
    }

    #[test]
    fn test_upload_error_display() {
        let err = UploadError::Configuration("FTP server address is not set".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: FTP server address is not set"
        );

        let err: UploadError = TransportError::new(TransportStage::Connect, "refused").into();
        assert_eq!(err.to_string(), "Transport error: connect failed: refused");
    }

    #[test]
    fn test_domain_error_maps_to_configuration() {
        let err: UploadError = DomainError::InvalidEndpoint("::".into()).into();
        assert!(matches!(err, UploadError::Configuration(_)));
    }
}
