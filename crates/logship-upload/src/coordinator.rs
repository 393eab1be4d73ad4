//! Upload coordinator - trigger admission and the single job lane
//!
//! The coordinator turns any number of triggers into at most one upload
//! job at a time. It owns the trigger sources' lifecycle: whenever the
//! "upload enabled" or "share interval" settings change, [`setup`] tears
//! everything down and re-creates it from the current policy.
//!
//! ## Admission
//!
//! ```text
//!            try_submit (CAS)          begin (CAS)
//!   Idle ────────────────→ Pending ────────────→ Running
//!    ▲                       │                      │
//!    └──── cancel_pending ───┘                      │
//!    └─────────────────────── finish ───────────────┘
//! ```
//!
//! A trigger is dropped when uploads are disabled or when the lane is not
//! idle. The lane state is a single atomic, so concurrent triggers can
//! never both be admitted.
//!
//! [`setup`]: UploadCoordinator::setup

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logship_core::domain::{ConnectivityState, JobReport};
use logship_core::ports::ISettingsStore;

use crate::connectivity::ConnectivityMonitor;
use crate::engine::TransferEngine;
use crate::scheduler::{IntervalScheduler, ShareHook};
use crate::watcher::DirectoryWatcher;
use crate::Trigger;

const TRIGGER_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Job lane state
// ============================================================================

/// State of the single job lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneState {
    Idle,
    Pending,
    Running,
}

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const RUNNING: u8 = 2;

struct JobSlot(AtomicU8);

impl JobSlot {
    fn new() -> Self {
        Self(AtomicU8::new(IDLE))
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn try_submit(&self) -> bool {
        self.transition(IDLE, PENDING)
    }

    fn cancel_pending(&self) -> bool {
        self.transition(PENDING, IDLE)
    }

    fn begin(&self) -> bool {
        self.transition(PENDING, RUNNING)
    }

    fn finish(&self) {
        self.0.store(IDLE, Ordering::Release);
    }

    fn state(&self) -> LaneState {
        match self.0.load(Ordering::Acquire) {
            PENDING => LaneState::Pending,
            RUNNING => LaneState::Running,
            _ => LaneState::Idle,
        }
    }
}

/// Result of submitting a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// A job will run for this trigger
    Admitted,
    /// Uploads are disabled; trigger dropped
    PolicyDisabled,
    /// A job is already pending or running; trigger dropped
    AlreadyActive,
}

#[derive(Default)]
struct Stats {
    received: AtomicU64,
    admitted: AtomicU64,
    dropped_disabled: AtomicU64,
    dropped_busy: AtomicU64,
}

/// Point-in-time view of the coordinator, for the CLI and logs
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub enabled: bool,
    pub lane: LaneState,
    pub connectivity: ConnectivityState,
    pub watching: Option<PathBuf>,
    pub timer_running: bool,
    pub triggers_received: u64,
    pub triggers_admitted: u64,
    pub dropped_disabled: u64,
    pub dropped_busy: u64,
    pub last_report: Option<JobReport>,
}

// ============================================================================
// UploadCoordinator
// ============================================================================

struct NetworkTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    network: Option<NetworkTask>,
}

struct Inner {
    settings: Arc<dyn ISettingsStore>,
    engine: TransferEngine,
    connectivity: Arc<ConnectivityMonitor>,
    watcher: DirectoryWatcher,
    scheduler: IntervalScheduler,
    directory: PathBuf,

    slot: JobSlot,
    wake: Notify,
    job_cancel: Mutex<CancellationToken>,
    enabled: AtomicBool,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    stats: Stats,
    last_report: Mutex<Option<JobReport>>,

    triggers_rx: Mutex<Option<mpsc::Receiver<Trigger>>>,
    settings_rx: Mutex<Option<broadcast::Receiver<logship_core::ports::SettingKey>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

/// Admission and dedup layer in front of the transfer engine
#[derive(Clone)]
pub struct UploadCoordinator {
    inner: Arc<Inner>,
}

impl UploadCoordinator {
    /// Wires the coordinator; nothing runs until [`start`](Self::start)
    pub fn new(
        settings: Arc<dyn ISettingsStore>,
        engine: TransferEngine,
        connectivity: Arc<ConnectivityMonitor>,
        share_hook: Arc<dyn ShareHook>,
        directory: PathBuf,
    ) -> Self {
        let (tx, rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
        // Subscribe before anything can change so no notification is missed
        let settings_rx = settings.subscribe();
        let scheduler = IntervalScheduler::new(Arc::clone(&settings), share_hook, tx.clone());

        Self {
            inner: Arc::new(Inner {
                settings,
                engine,
                connectivity,
                watcher: DirectoryWatcher::new(tx),
                scheduler,
                directory,
                slot: JobSlot::new(),
                wake: Notify::new(),
                job_cancel: Mutex::new(CancellationToken::new()),
                enabled: AtomicBool::new(false),
                lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
                stats: Stats::default(),
                last_report: Mutex::new(None),
                triggers_rx: Mutex::new(Some(rx)),
                settings_rx: Mutex::new(Some(settings_rx)),
                tasks: Mutex::new(Vec::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Spawns the job lane and the intake loops, then runs the first setup
    ///
    /// Calling `start` twice has no further effect.
    pub async fn start(&self) {
        let triggers = lock(&self.inner.triggers_rx).take();
        let settings = lock(&self.inner.settings_rx).take();
        let (Some(triggers), Some(settings)) = (triggers, settings) else {
            debug!("Coordinator already started");
            return;
        };

        let handles = vec![
            tokio::spawn(job_lane(Arc::clone(&self.inner))),
            tokio::spawn(trigger_intake(Arc::clone(&self.inner), triggers)),
            tokio::spawn(settings_watch(Arc::clone(&self.inner), settings)),
        ];
        lock(&self.inner.tasks).extend(handles);

        info!(directory = %self.inner.directory.display(), "Upload coordinator started");
        self.setup().await;
    }

    /// Re-evaluates the enabled state from the current policy
    ///
    /// Always stops the watcher, the connectivity subscription and the
    /// interval timer first; when uploads are enabled they are started
    /// again, otherwise any pending job request is cancelled. Safe to call
    /// any number of times.
    pub async fn setup(&self) {
        self.inner.setup().await;
    }

    /// Submits a trigger for admission
    pub fn submit_upload_job(&self, trigger: Trigger) -> Admission {
        self.inner.submit(trigger)
    }

    /// Manual "upload now" request
    pub fn request_upload(&self) -> Admission {
        self.submit_upload_job(Trigger::Manual)
    }

    /// Cancels a job that was admitted but has not started
    ///
    /// Returns whether a pending request was cancelled. A running job is
    /// not affected.
    pub fn cancel_upload_job(&self) -> bool {
        let cancelled = self.inner.slot.cancel_pending();
        if cancelled {
            info!("Pending upload job cancelled");
        }
        cancelled
    }

    pub fn status(&self) -> CoordinatorStatus {
        let inner = &self.inner;
        CoordinatorStatus {
            enabled: inner.enabled.load(Ordering::Acquire),
            lane: inner.slot.state(),
            connectivity: inner.connectivity.state(),
            watching: inner.watcher.watched_path(),
            timer_running: inner.scheduler.is_running(),
            triggers_received: inner.stats.received.load(Ordering::Relaxed),
            triggers_admitted: inner.stats.admitted.load(Ordering::Relaxed),
            dropped_disabled: inner.stats.dropped_disabled.load(Ordering::Relaxed),
            dropped_busy: inner.stats.dropped_busy.load(Ordering::Relaxed),
            last_report: lock(&inner.last_report).clone(),
        }
    }

    /// Report of the most recent finished job
    pub fn last_report(&self) -> Option<JobReport> {
        lock(&self.inner.last_report).clone()
    }

    /// Stops every source, cancels retries and waits for background tasks
    ///
    /// A session already in flight is allowed to finish.
    pub async fn shutdown(&self) {
        info!("Upload coordinator shutting down");
        // Cancelled before taking the lifecycle lock so a setup queued
        // behind it cannot restart the sources
        self.inner.shutdown.cancel();
        {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            self.inner.stop_sources(&mut lifecycle).await;
        }
        self.inner.enabled.store(false, Ordering::Release);
        self.inner.slot.cancel_pending();
        self.inner.cancel_running_job();

        let handles: Vec<JoinHandle<()>> = lock(&self.inner.tasks).drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Coordinator task ended abnormally");
            }
        }
        info!("Upload coordinator stopped");
    }
}

impl Inner {
    fn submit(&self, trigger: Trigger) -> Admission {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        if !self.settings.policy().enabled {
            self.stats.dropped_disabled.fetch_add(1, Ordering::Relaxed);
            debug!(trigger = %trigger, "Uploads disabled, trigger dropped");
            return Admission::PolicyDisabled;
        }
        if !self.slot.try_submit() {
            self.stats.dropped_busy.fetch_add(1, Ordering::Relaxed);
            debug!(trigger = %trigger, "Upload job already active, trigger dropped");
            return Admission::AlreadyActive;
        }

        self.stats.admitted.fetch_add(1, Ordering::Relaxed);
        info!(trigger = %trigger, "Upload job admitted");
        self.wake.notify_one();
        Admission::Admitted
    }

    async fn setup(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stop_sources(&mut lifecycle).await;
        if self.shutdown.is_cancelled() {
            debug!("Coordinator shut down, sources stay stopped");
            return;
        }

        let policy = self.settings.policy();
        if policy.enabled {
            if let Err(e) = self.watcher.start(&self.directory) {
                error!(error = %e, "Directory watcher unavailable, continuing without it");
            }
            lifecycle.network = Some(self.spawn_network_task());
            self.scheduler.start(&policy).await;
            self.enabled.store(true, Ordering::Release);
            info!(
                interval_minutes = policy.interval_minutes,
                transport = %policy.transport,
                "Uploads enabled"
            );
        } else {
            self.slot.cancel_pending();
            self.cancel_running_job();
            self.enabled.store(false, Ordering::Release);
            info!("Uploads disabled");
        }
    }

    async fn stop_sources(&self, lifecycle: &mut Lifecycle) {
        self.watcher.stop();
        if let Some(network) = lifecycle.network.take() {
            network.cancel.cancel();
            if let Err(e) = network.handle.await {
                warn!(error = %e, "Connectivity subscription ended abnormally");
            }
        }
        self.scheduler.stop().await;
    }

    /// Cancels the running job's retries and arms a fresh token
    fn cancel_running_job(&self) {
        let previous = std::mem::replace(&mut *lock(&self.job_cancel), CancellationToken::new());
        previous.cancel();
    }

    fn spawn_network_task(self: &Arc<Self>) -> NetworkTask {
        let cancel = CancellationToken::new();
        let mut states = self.connectivity.subscribe();
        let inner = Arc::clone(self);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            // The current value counts as an emission, as with a state flow
            let mut current = *states.borrow_and_update();
            if current.is_available() {
                inner.submit(Trigger::ConnectivityAvailable);
            }
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = *states.borrow_and_update();
                        if next != current && next.is_available() {
                            inner.submit(Trigger::ConnectivityAvailable);
                        }
                        current = next;
                    }
                }
            }
        });

        NetworkTask { cancel, handle }
    }
}

// ============================================================================
// Background loops
// ============================================================================

async fn job_lane(inner: Arc<Inner>) {
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = inner.wake.notified() => {}
        }
        if !inner.slot.begin() {
            // The pending request was cancelled before it started
            continue;
        }

        let policy = inner.settings.policy();
        let cancel = lock(&inner.job_cancel).child_token();
        let report = inner.engine.run_job(&policy, &inner.directory, &cancel).await;
        *lock(&inner.last_report) = Some(report);
        inner.slot.finish();
    }
    debug!("Job lane stopped");
}

async fn trigger_intake(inner: Arc<Inner>, mut triggers: mpsc::Receiver<Trigger>) {
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            trigger = triggers.recv() => match trigger {
                Some(trigger) => {
                    inner.submit(trigger);
                }
                None => break,
            },
        }
    }
    debug!("Trigger intake stopped");
}

async fn settings_watch(
    inner: Arc<Inner>,
    mut changes: broadcast::Receiver<logship_core::ports::SettingKey>,
) {
    loop {
        let change = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            change = changes.recv() => change,
        };
        match change {
            Ok(key) if key.requires_resetup() => {
                info!(key = %key, "Upload schedule setting changed");
                inner.setup().await;
            }
            Ok(key) => debug!(key = %key, "Setting changed"),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Missed setting changes, re-running setup");
                inner.setup().await;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("Settings watch stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
