//! Interval scheduler - recurring upload trigger
//!
//! Fires [`Trigger::IntervalElapsed`] every `period`, measured from the
//! last fire persisted in the settings store so that the cadence survives
//! restarts. Each fire runs the manual-share hook, persists the new fire
//! time, then raises the trigger.
//!
//! ## Timing
//!
//! ```text
//! elapsed = now - last_fire
//! elapsed <  period  → first fire after (period - elapsed)
//! elapsed >= period  → first fire immediately
//! afterwards         → every period, counted from the previous fire
//! ```
//!
//! The period is not aligned to wall-clock boundaries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logship_core::domain::UploadPolicy;
use logship_core::ports::ISettingsStore;

use crate::Trigger;

/// Action run on every interval fire before the upload trigger
#[async_trait::async_trait]
pub trait ShareHook: Send + Sync {
    async fn share(&self);
}

/// Hook that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopShareHook;

#[async_trait::async_trait]
impl ShareHook for NoopShareHook {
    async fn share(&self) {}
}

struct RunningTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Recurring interval trigger
pub struct IntervalScheduler {
    settings: Arc<dyn ISettingsStore>,
    hook: Arc<dyn ShareHook>,
    triggers: mpsc::Sender<Trigger>,
    running: Mutex<Option<RunningTimer>>,
}

impl IntervalScheduler {
    pub fn new(
        settings: Arc<dyn ISettingsStore>,
        hook: Arc<dyn ShareHook>,
        triggers: mpsc::Sender<Trigger>,
    ) -> Self {
        Self {
            settings,
            hook,
            triggers,
            running: Mutex::new(None),
        }
    }

    /// Starts the timer for `policy`, cancelling any running one
    pub async fn start(&self, policy: &UploadPolicy) {
        self.stop().await;

        let period = policy.interval();
        let delay = first_delay(now_millis(), policy.last_fire_epoch_millis, period);
        info!(
            period_minutes = policy.interval_minutes,
            first_fire_secs = delay.as_secs(),
            "Interval scheduler started"
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.settings),
            Arc::clone(&self.hook),
            self.triggers.clone(),
            delay,
            period,
            cancel.clone(),
        ));
        *self.running.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(RunningTimer { cancel, handle });
    }

    /// Cancels the timer and waits for it to finish
    pub async fn stop(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "Interval timer ended abnormally");
            }
            info!("Interval scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// Delay before the first fire
///
/// A last fire time in the future (clock moved backwards) counts as a
/// fire that just happened.
pub fn first_delay(now_millis: i64, last_fire_millis: i64, period: Duration) -> Duration {
    let elapsed = Duration::from_millis(now_millis.saturating_sub(last_fire_millis).max(0) as u64);
    period.saturating_sub(elapsed)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn run_timer(
    settings: Arc<dyn ISettingsStore>,
    hook: Arc<dyn ShareHook>,
    triggers: mpsc::Sender<Trigger>,
    first: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut delay = first;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        debug!("Interval elapsed");
        hook.share().await;
        if let Err(e) = settings.set_last_timer_fire(now_millis()).await {
            warn!(error = %e, "Failed to persist last interval fire time");
        }
        if triggers.send(Trigger::IntervalElapsed).await.is_err() {
            debug!("Trigger channel closed, interval timer exiting");
            break;
        }
        delay = period;
    }
}
