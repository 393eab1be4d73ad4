//! Logship Transport - Wire protocol adapters
//!
//! Implements the [`ITransport`] session contract from `logship-core` for
//! three protocols:
//!
//! - [`FtpTransport`] - plain FTP and FTP over explicit TLS, passive mode,
//!   built on `suppaftp` with `native-tls`
//! - [`SftpTransport`] - SSH file transfer built on `ssh2`, with a
//!   configurable host key policy
//!
//! [`DefaultTransportFactory`] selects the adapter from the policy's
//! transport kind. All adapters are blocking; callers run them on a
//! blocking thread.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use logship_core::domain::{Endpoint, TransportError, TransportKind, TransportStage, UploadPolicy};
use logship_core::ports::{ITransport, ITransportFactory};

pub mod ftp;
pub mod sftp;

pub use ftp::FtpTransport;
pub use sftp::SftpTransport;

/// Connect timeout used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a fresh adapter for every sub-session
#[derive(Debug, Clone)]
pub struct DefaultTransportFactory {
    connect_timeout: Duration,
}

impl DefaultTransportFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for DefaultTransportFactory {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl ITransportFactory for DefaultTransportFactory {
    fn create(&self, policy: &UploadPolicy) -> Result<Box<dyn ITransport>, TransportError> {
        let transport: Box<dyn ITransport> = match policy.transport {
            TransportKind::Ftp => Box::new(FtpTransport::plain(self.connect_timeout)),
            TransportKind::Ftps => Box::new(FtpTransport::explicit_tls(self.connect_timeout)?),
            TransportKind::Sftp => Box::new(SftpTransport::new(
                self.connect_timeout,
                policy.host_key_policy,
                policy
                    .known_hosts
                    .clone()
                    .unwrap_or_else(default_known_hosts),
            )),
        };
        Ok(transport)
    }
}

/// `~/.ssh/known_hosts`
pub fn default_known_hosts() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".ssh")
        .join("known_hosts")
}

/// Resolves the endpoint to socket addresses
pub(crate) fn resolve(endpoint: &Endpoint) -> Result<Vec<SocketAddr>, TransportError> {
    let addrs: Vec<SocketAddr> = endpoint
        .address()
        .to_socket_addrs()
        .map_err(|e| TransportError::new(TransportStage::Connect, format!("{endpoint}: {e}")))?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::new(
            TransportStage::Connect,
            format!("{endpoint}: no addresses found"),
        ));
    }
    Ok(addrs)
}

/// Opens a TCP connection to the first reachable resolved address
pub(crate) fn connect_tcp(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let mut last_error = None;
    for addr in resolve(endpoint)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(TransportError::new(
        TransportStage::Connect,
        match last_error {
            Some(e) => format!("{endpoint}: {e}"),
            None => format!("{endpoint}: unreachable"),
        },
    ))
}
