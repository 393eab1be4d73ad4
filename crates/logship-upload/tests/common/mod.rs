//! Shared fakes for the upload integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;

use logship_core::domain::{
    Credentials, Endpoint, TransportError, TransportKind, TransportStage, UploadPolicy,
};
use logship_core::ports::{
    INotificationService, ISettingsStore, ITransport, ITransportFactory, SettingKey,
};

// ============================================================================
// Settings
// ============================================================================

pub struct MemorySettings {
    policy: Mutex<UploadPolicy>,
    changes: broadcast::Sender<SettingKey>,
}

impl MemorySettings {
    pub fn new(policy: UploadPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy: Mutex::new(policy),
            changes: broadcast::channel(16).0,
        })
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.policy.lock().unwrap().enabled = enabled;
        let _ = self.changes.send(SettingKey::UploadEnabled);
    }
}

#[async_trait::async_trait]
impl ISettingsStore for MemorySettings {
    fn policy(&self) -> UploadPolicy {
        self.policy.lock().unwrap().clone()
    }

    async fn set_last_timer_fire(&self, epoch_millis: i64) -> anyhow::Result<()> {
        self.policy.lock().unwrap().last_fire_epoch_millis = epoch_millis;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingKey> {
        self.changes.subscribe()
    }
}

/// Complete, enabled policy whose timer fired just now
pub fn ready_policy() -> UploadPolicy {
    UploadPolicy {
        enabled: true,
        interval_minutes: 60,
        last_fire_epoch_millis: chrono::Utc::now().timestamp_millis(),
        transport: TransportKind::Ftp,
        endpoint_url: "127.0.0.1:2121".into(),
        credentials: Credentials::new("logger", "hunter2"),
        remote_path: "/incoming".into(),
        ..UploadPolicy::default()
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub errors: Mutex<Vec<String>>,
    pub raised: AtomicU32,
    pub cleared: AtomicU32,
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify_foreground_activity(&self, _title: &str, _icon: &str) -> anyhow::Result<()> {
        self.raised.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_foreground_activity(&self) -> anyhow::Result<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_error(&self, message: &str) -> anyhow::Result<()> {
        self.errors.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// In-memory server shared by every fake transport session
#[derive(Default)]
pub struct FakeServer {
    stored: Mutex<Vec<(String, Vec<u8>)>>,
    events: Mutex<Vec<String>>,
    listings: Mutex<Vec<Vec<String>>>,
    put_failures: Mutex<HashMap<String, u32>>,
    connect_failures: AtomicU32,
    put_delay: Mutex<Duration>,
    observed_dir: Mutex<Option<PathBuf>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse the next `times` puts of `name`
    pub fn fail_put(&self, name: &str, times: u32) {
        self.put_failures
            .lock()
            .unwrap()
            .insert(name.to_string(), times);
    }

    /// Refuse the next `times` connections
    pub fn fail_connect(&self, times: u32) {
        self.connect_failures.store(times, Ordering::SeqCst);
    }

    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = delay;
    }

    /// Record the directory listing at every connect
    pub fn observe(&self, dir: &Path) {
        *self.observed_dir.lock().unwrap() = Some(dir.to_path_buf());
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        self.stored.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn listings(&self) -> Vec<Vec<String>> {
        self.listings.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct FakeFactory(pub Arc<FakeServer>);

impl ITransportFactory for FakeFactory {
    fn create(&self, _policy: &UploadPolicy) -> Result<Box<dyn ITransport>, TransportError> {
        Ok(Box::new(FakeTransport {
            server: Arc::clone(&self.0),
            connected: false,
        }))
    }
}

struct FakeTransport {
    server: Arc<FakeServer>,
    connected: bool,
}

impl ITransport for FakeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ftp
    }

    fn connect(&mut self, _endpoint: &Endpoint) -> Result<(), TransportError> {
        let server = &self.server;
        let refused = server
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            server.record("connect-fail".into());
            return Err(TransportError::new(TransportStage::Connect, "connection refused"));
        }

        let now = server.active.fetch_add(1, Ordering::SeqCst) + 1;
        server.max_active.fetch_max(now, Ordering::SeqCst);
        self.connected = true;
        server.record("connect".into());

        if let Some(dir) = server.observed_dir.lock().unwrap().clone() {
            server.listings.lock().unwrap().push(list_dir(&dir));
        }
        Ok(())
    }

    fn authenticate(&mut self, _credentials: &Credentials) -> Result<(), TransportError> {
        Ok(())
    }

    fn change_directory(&mut self, _remote_path: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn put(&mut self, reader: &mut dyn Read, remote_name: &str) -> Result<u64, TransportError> {
        let server = &self.server;
        let refuse = {
            let mut failures = server.put_failures.lock().unwrap();
            match failures.get_mut(remote_name) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };
        if refuse {
            server.record(format!("put-fail {remote_name}"));
            return Err(TransportError::new(TransportStage::Put, "451 local error"));
        }

        let delay = *server.put_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| TransportError::new(TransportStage::Put, e))?;
        let len = body.len() as u64;
        server
            .stored
            .lock()
            .unwrap()
            .push((remote_name.to_string(), body));
        server.record(format!("put {remote_name}"));
        Ok(len)
    }

    fn close(&mut self) {
        if self.connected {
            self.connected = false;
            self.server.active.fetch_sub(1, Ordering::SeqCst);
        }
        self.server.record("close".into());
    }
}

// ============================================================================
// Files
// ============================================================================

/// Writes `name` with its own name as content, `age_secs` old
pub fn write_aged(dir: &Path, name: &str, age_secs: u64) {
    let path = dir.join(name);
    std::fs::write(&path, name.as_bytes()).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Polls `condition` every 10 ms for up to five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
