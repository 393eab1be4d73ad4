//! Connectivity monitor
//!
//! Turns the OS reachability callbacks reported by an
//! [`IReachabilitySource`] into one always-current [`ConnectivityState`]
//! held in a `tokio::sync::watch` cell. Subscribers see the current value
//! immediately and are woken only when the value actually changes.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logship_core::domain::ConnectivityState;
use logship_core::ports::{IReachabilitySource, ReachabilityEvent};

const EVENT_CHANNEL_CAPACITY: usize = 16;

struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Live "internet reachable" cell with an explicit start/stop lifecycle
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
    task: Mutex<Option<MonitorTask>>,
}

impl ConnectivityMonitor {
    /// Creates a stopped monitor reporting [`ConnectivityState::Lost`]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectivityState::Lost);
        Self {
            state,
            task: Mutex::new(None),
        }
    }

    /// Probes once, then follows the source's event stream until stopped
    ///
    /// A failed probe is logged and treated as [`ConnectivityState::Lost`].
    /// Starting an already running monitor restarts it.
    pub async fn start(&self, source: Arc<dyn IReachabilitySource>) {
        self.stop().await;

        let initial = match source.probe().await {
            Ok(reachable) => ConnectivityState::from_reachable(reachable),
            Err(e) => {
                warn!(error = %e, "Reachability probe failed, assuming no connectivity");
                ConnectivityState::Lost
            }
        };
        self.set_state(initial);
        info!(state = %initial, "Connectivity monitor started");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(follow_source(
            source,
            self.state.clone(),
            cancel.clone(),
        ));
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(MonitorTask { cancel, handle });
    }

    /// Stops following the source; the last value stays readable
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Connectivity task ended abnormally");
            }
            info!("Connectivity monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Current value
    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Subscribes to the live cell
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Force-sets the value; subscribers are only woken on an actual change
    pub fn set_state(&self, next: ConnectivityState) {
        apply(&self.state, next);
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(state: &watch::Sender<ConnectivityState>, next: ConnectivityState) {
    let changed = state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    if changed {
        info!(state = %next, "Connectivity changed");
    }
}

fn map_event(event: ReachabilityEvent) -> ConnectivityState {
    match event {
        ReachabilityEvent::Available => ConnectivityState::Available,
        ReachabilityEvent::Lost | ReachabilityEvent::Unavailable => ConnectivityState::Lost,
    }
}

async fn follow_source(
    source: Arc<dyn IReachabilitySource>,
    state: watch::Sender<ConnectivityState>,
    cancel: CancellationToken,
) {
    let (tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let run = source.run(tx);
    tokio::pin!(run);

    let mut run_finished = false;
    let mut events_open = true;
    while !(run_finished && !events_open) {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = &mut run, if !run_finished => {
                run_finished = true;
                match result {
                    Ok(()) => info!("Reachability subscription ended"),
                    Err(e) => {
                        warn!(error = %e, "Reachability subscription failed");
                        apply(&state, ConnectivityState::Lost);
                    }
                }
            }
            event = events.recv(), if events_open => match event {
                Some(event) => {
                    debug!(event = ?event, "Reachability event");
                    apply(&state, map_event(event));
                }
                None => events_open = false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Source whose events are pushed by the test
    struct ScriptedSource {
        probe: Option<bool>,
        script: Mutex<Option<mpsc::Receiver<ReachabilityEvent>>>,
    }

    impl ScriptedSource {
        fn new(probe: Option<bool>) -> (Arc<Self>, mpsc::Sender<ReachabilityEvent>) {
            let (tx, rx) = mpsc::channel(8);
            let source = Arc::new(Self {
                probe,
                script: Mutex::new(Some(rx)),
            });
            (source, tx)
        }
    }

    #[async_trait::async_trait]
    impl IReachabilitySource for ScriptedSource {
        async fn probe(&self) -> anyhow::Result<bool> {
            self.probe.ok_or_else(|| anyhow::anyhow!("probe unavailable"))
        }

        async fn run(&self, events: mpsc::Sender<ReachabilityEvent>) -> anyhow::Result<()> {
            let script = self.script.lock().unwrap().take();
            let Some(mut script) = script else {
                return Ok(());
            };
            while let Some(event) = script.recv().await {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Ok(())
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<ConnectivityState>, want: ConnectivityState) {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == want))
            .await
            .expect("state not reached")
            .expect("monitor dropped");
    }

    #[tokio::test]
    async fn test_probe_sets_initial_state() {
        let monitor = ConnectivityMonitor::new();
        let (source, _script) = ScriptedSource::new(Some(true));
        monitor.start(source).await;
        assert_eq!(monitor.state(), ConnectivityState::Available);
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_probe_error_falls_back_to_lost() {
        let monitor = ConnectivityMonitor::new();
        monitor.set_state(ConnectivityState::Available);
        let (source, _script) = ScriptedSource::new(None);
        monitor.start(source).await;
        assert_eq!(monitor.state(), ConnectivityState::Lost);
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_events_update_state() {
        let monitor = ConnectivityMonitor::new();
        let (source, script) = ScriptedSource::new(Some(false));
        monitor.start(source).await;
        let mut rx = monitor.subscribe();

        script.send(ReachabilityEvent::Available).await.unwrap();
        wait_for(&mut rx, ConnectivityState::Available).await;

        script.send(ReachabilityEvent::Unavailable).await.unwrap();
        wait_for(&mut rx, ConnectivityState::Lost).await;

        script.send(ReachabilityEvent::Available).await.unwrap();
        wait_for(&mut rx, ConnectivityState::Available).await;
        script.send(ReachabilityEvent::Lost).await.unwrap();
        wait_for(&mut rx, ConnectivityState::Lost).await;

        monitor.stop().await;
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_repeated_value_does_not_notify() {
        let monitor = ConnectivityMonitor::new();
        let mut rx = monitor.subscribe();
        rx.borrow_and_update();

        monitor.set_state(ConnectivityState::Available);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        monitor.set_state(ConnectivityState::Available);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_keeps_value() {
        let monitor = ConnectivityMonitor::new();
        monitor.stop().await;

        let (source, _script) = ScriptedSource::new(Some(true));
        monitor.start(source).await;
        monitor.stop().await;
        monitor.stop().await;
        assert_eq!(monitor.state(), ConnectivityState::Available);
    }

    #[test]
    fn test_subscriber_count() {
        let monitor = ConnectivityMonitor::new();
        assert_eq!(monitor.subscriber_count(), 0);
        let rx = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 1);
        drop(rx);
        assert_eq!(monitor.subscriber_count(), 0);
    }
}
