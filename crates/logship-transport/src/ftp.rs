//! FTP and FTPS adapter
//!
//! Both protocols share one control stream type. Plain FTP leaves the
//! stream unencrypted; FTPS upgrades it with `AUTH TLS` right after the
//! welcome message (explicit TLS) and protects the data channel the same
//! way. Transfers always use passive mode.

use std::io::Read;
use std::time::Duration;

use native_tls::TlsConnector;
use suppaftp::{Mode, NativeTlsConnector, NativeTlsFtpStream};
use tracing::{debug, info};

use logship_core::domain::{Credentials, Endpoint, TransportError, TransportKind, TransportStage};
use logship_core::ports::ITransport;

use crate::resolve;

/// FTP session, optionally secured with explicit TLS
pub struct FtpTransport {
    connect_timeout: Duration,
    tls: Option<TlsConnector>,
    stream: Option<NativeTlsFtpStream>,
}

impl FtpTransport {
    /// Plain FTP
    pub fn plain(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            tls: None,
            stream: None,
        }
    }

    /// FTP with explicit TLS, verifying the server certificate against
    /// the system trust store
    ///
    /// # Errors
    /// Fails at the `Connect` stage if the TLS backend cannot be initialised.
    pub fn explicit_tls(connect_timeout: Duration) -> Result<Self, TransportError> {
        let tls = TlsConnector::new()
            .map_err(|e| TransportError::new(TransportStage::Connect, format!("TLS setup: {e}")))?;
        Ok(Self {
            connect_timeout,
            tls: Some(tls),
            stream: None,
        })
    }

    fn stream(&mut self, stage: TransportStage) -> Result<&mut NativeTlsFtpStream, TransportError> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::new(stage, "not connected"))
    }
}

impl ITransport for FtpTransport {
    fn kind(&self) -> TransportKind {
        if self.tls.is_some() {
            TransportKind::Ftps
        } else {
            TransportKind::Ftp
        }
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let mut last_error = None;
        let mut connected = None;
        for addr in resolve(endpoint)? {
            match NativeTlsFtpStream::connect_timeout(addr, self.connect_timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let mut stream = match (connected, last_error) {
            (Some(stream), _) => stream,
            (None, Some(e)) => {
                return Err(TransportError::new(
                    TransportStage::Connect,
                    format!("{endpoint}: {e}"),
                ))
            }
            (None, None) => {
                return Err(TransportError::new(
                    TransportStage::Connect,
                    format!("{endpoint}: unreachable"),
                ))
            }
        };

        if let Some(tls) = &self.tls {
            stream = stream
                .into_secure(NativeTlsConnector::from(tls.clone()), &endpoint.host)
                .map_err(|e| {
                    TransportError::new(TransportStage::Connect, format!("AUTH TLS: {e}"))
                })?;
        }

        info!(endpoint = %endpoint, kind = %self.kind(), "Connected");
        self.stream = Some(stream);
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let stream = self.stream(TransportStage::Authenticate)?;
        stream
            .login(&credentials.username, &credentials.secret)
            .map_err(|e| TransportError::new(TransportStage::Authenticate, e))?;
        stream.set_mode(Mode::Passive);
        debug!(user = %credentials.username, "Logged in, passive mode");
        Ok(())
    }

    fn change_directory(&mut self, remote_path: &str) -> Result<(), TransportError> {
        self.stream(TransportStage::ChangeDirectory)?
            .cwd(remote_path)
            .map_err(|e| {
                TransportError::new(TransportStage::ChangeDirectory, format!("{remote_path}: {e}"))
            })
    }

    fn put(&mut self, mut reader: &mut dyn Read, remote_name: &str) -> Result<u64, TransportError> {
        self.stream(TransportStage::Put)?
            .put_file(remote_name, &mut reader)
            .map_err(|e| TransportError::new(TransportStage::Put, format!("{remote_name}: {e}")))
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.quit() {
                debug!(error = %e, "QUIT failed, dropping connection");
            }
        }
    }
}

impl Drop for FtpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
