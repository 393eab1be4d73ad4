//! Reachability port (driven/secondary port)
//!
//! Abstracts the operating system's network reachability reporting.
//! The connectivity monitor probes once at start, then consumes the
//! event stream produced by [`IReachabilitySource::run`].
//!
//! Implementations only report networks that are internet-capable and
//! validated; deciding what counts as "validated" is the OS's job.

use tokio::sync::mpsc;

/// A reachability callback from the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityEvent {
    /// A validated internet-capable network became available
    Available,
    /// The network that was available went away
    Lost,
    /// No matching network could be found
    Unavailable,
}

/// Port trait for OS reachability reporting
#[async_trait::async_trait]
pub trait IReachabilitySource: Send + Sync {
    /// One-shot check of current reachability
    async fn probe(&self) -> anyhow::Result<bool>;

    /// Streams reachability events into `events` until the OS subscription
    /// ends or the receiver is dropped
    async fn run(&self, events: mpsc::Sender<ReachabilityEvent>) -> anyhow::Result<()>;
}
