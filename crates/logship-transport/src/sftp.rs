//! SFTP adapter
//!
//! One SSH session per sub-session, password authentication, and a
//! single SFTP channel. The server's host key is checked against a
//! known_hosts file unless the policy is [`HostKeyPolicy::AcceptAny`].

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};
use tracing::{debug, info, warn};

use logship_core::domain::{
    Credentials, Endpoint, HostKeyPolicy, TransportError, TransportKind, TransportStage,
};
use logship_core::ports::ITransport;

use crate::connect_tcp;

/// SFTP session over ssh2
pub struct SftpTransport {
    connect_timeout: Duration,
    host_key_policy: HostKeyPolicy,
    known_hosts: PathBuf,
    session: Option<Session>,
    sftp: Option<Sftp>,
    directory: Option<PathBuf>,
}

impl SftpTransport {
    pub fn new(connect_timeout: Duration, host_key_policy: HostKeyPolicy, known_hosts: PathBuf) -> Self {
        Self {
            connect_timeout,
            host_key_policy,
            known_hosts,
            session: None,
            sftp: None,
            directory: None,
        }
    }

    fn verify_host_key(&self, session: &Session, endpoint: &Endpoint) -> Result<(), TransportError> {
        match self.host_key_policy {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    endpoint = %endpoint,
                    "Host key verification is disabled (host_key_policy: accept_any)"
                );
                Ok(())
            }
            HostKeyPolicy::Strict => {
                let fail = |msg: String| TransportError::new(TransportStage::Connect, msg);
                let (key, _) = session
                    .host_key()
                    .ok_or_else(|| fail("server sent no host key".into()))?;
                let mut known = session
                    .known_hosts()
                    .map_err(|e| fail(format!("known hosts: {e}")))?;
                known
                    .read_file(&self.known_hosts, KnownHostFileKind::OpenSSH)
                    .map_err(|e| fail(format!("{}: {e}", self.known_hosts.display())))?;

                match known.check_port(&endpoint.host, endpoint.port, key) {
                    CheckResult::Match => Ok(()),
                    CheckResult::Mismatch => Err(fail(format!(
                        "host key for {endpoint} does not match {}",
                        self.known_hosts.display()
                    ))),
                    CheckResult::NotFound => Err(fail(format!(
                        "{endpoint} is not listed in {}",
                        self.known_hosts.display()
                    ))),
                    CheckResult::Failure => Err(fail(format!(
                        "host key check for {endpoint} failed"
                    ))),
                }
            }
        }
    }

    fn sftp(&self, stage: TransportStage) -> Result<&Sftp, TransportError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| TransportError::new(stage, "not authenticated"))
    }
}

impl ITransport for SftpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sftp
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let tcp = connect_tcp(endpoint, self.connect_timeout)?;
        let fail = |e: ssh2::Error| TransportError::new(TransportStage::Connect, format!("{endpoint}: {e}"));

        let mut session = Session::new().map_err(fail)?;
        session.set_timeout(u32::try_from(self.connect_timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(fail)?;
        self.verify_host_key(&session, endpoint)?;

        info!(endpoint = %endpoint, "Connected");
        self.session = Some(session);
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let fail = |msg: String| TransportError::new(TransportStage::Authenticate, msg);
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| fail("not connected".into()))?;

        session
            .userauth_password(&credentials.username, &credentials.secret)
            .map_err(|e| fail(e.to_string()))?;
        if !session.authenticated() {
            return Err(fail(format!("server rejected {}", credentials.username)));
        }
        let sftp = session
            .sftp()
            .map_err(|e| fail(format!("SFTP subsystem: {e}")))?;

        debug!(user = %credentials.username, "Authenticated");
        self.sftp = Some(sftp);
        Ok(())
    }

    fn change_directory(&mut self, remote_path: &str) -> Result<(), TransportError> {
        let dir = Path::new(remote_path);
        let stat = self
            .sftp(TransportStage::ChangeDirectory)?
            .stat(dir)
            .map_err(|e| TransportError::new(TransportStage::ChangeDirectory, format!("{remote_path}: {e}")))?;
        if !stat.is_dir() {
            return Err(TransportError::new(
                TransportStage::ChangeDirectory,
                format!("{remote_path}: not a directory"),
            ));
        }
        self.directory = Some(dir.to_path_buf());
        Ok(())
    }

    fn put(&mut self, reader: &mut dyn Read, remote_name: &str) -> Result<u64, TransportError> {
        let fail = |e: io::Error| TransportError::new(TransportStage::Put, format!("{remote_name}: {e}"));
        let target = self
            .directory
            .as_deref()
            .map(|dir| dir.join(remote_name))
            .ok_or_else(|| TransportError::new(TransportStage::Put, "no remote directory selected"))?;

        let mut file = self
            .sftp(TransportStage::Put)?
            .create(&target)
            .map_err(|e| TransportError::new(TransportStage::Put, format!("{}: {e}", target.display())))?;
        let bytes = io::copy(reader, &mut file).map_err(fail)?;
        file.flush().map_err(fail)?;
        Ok(bytes)
    }

    fn close(&mut self) {
        self.directory = None;
        self.sftp = None;
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "closing", None) {
                debug!(error = %e, "SSH disconnect failed");
            }
        }
    }
}

impl Drop for SftpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
