//! Transport port (driven/secondary port)
//!
//! This module defines the narrow session contract the transfer engine
//! drives for every wire protocol: connect, authenticate, change to the
//! remote folder, put files by name, close.
//!
//! ## Design Notes
//!
//! - Methods are blocking. Protocol clients for FTP and SSH are
//!   synchronous, so the engine runs whole sessions on the blocking pool.
//! - Errors are [`TransportError`] values tagged with the failing stage,
//!   which is what the engine's retry loop keys on.
//! - `close` never fails: it logs out and disconnects on a best-effort
//!   basis and must be safe to call after any earlier failure.

use std::io::Read;

use crate::domain::errors::TransportError;
use crate::domain::policy::{Credentials, Endpoint, TransportKind, UploadPolicy};

/// Everything a session needs to reach the remote folder
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub remote_path: String,
}

/// A single protocol session
///
/// The engine calls the methods in order `connect`, `authenticate`,
/// `change_directory`, any number of `put`, then always `close`.
pub trait ITransport: Send {
    /// Protocol implemented by this adapter
    fn kind(&self) -> TransportKind;

    /// Opens the control connection
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Logs in; FTP-family adapters also switch to passive mode here
    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError>;

    /// Makes `remote_path` the target folder for subsequent puts
    fn change_directory(&mut self, remote_path: &str) -> Result<(), TransportError>;

    /// Stores the stream under `remote_name` in the target folder
    ///
    /// Returns the number of bytes the server accepted. Only an `Ok`
    /// return counts as confirmed acceptance.
    fn put(&mut self, reader: &mut dyn Read, remote_name: &str) -> Result<u64, TransportError>;

    /// Logs out and disconnects, ignoring errors
    fn close(&mut self);
}

/// Creates a fresh, unconnected transport for each sub-session
pub trait ITransportFactory: Send + Sync {
    /// Selects the adapter for `policy.transport`
    ///
    /// # Errors
    /// Returns a [`TransportError`] at the `Connect` stage when the adapter
    /// cannot be constructed (for example, TLS initialisation failed).
    fn create(&self, policy: &UploadPolicy) -> Result<Box<dyn ITransport>, TransportError>;
}
