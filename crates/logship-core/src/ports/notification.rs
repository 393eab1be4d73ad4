//! Notification service port (driven/secondary port)
//!
//! This module defines the interface for telling the user that an upload
//! is running and that something went wrong. Implementations may log,
//! raise desktop notifications over D-Bus, or both.
//!
//! ## Design Notes
//!
//! - Notifications are fire-and-forget; nothing in the upload engine
//!   depends on whether delivery succeeded.
//! - Uses `anyhow::Result` because delivery errors are adapter-specific.
//!   Callers log and discard them.

/// Port trait for user-visible notifications
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Shows the ongoing-activity indicator while a job runs
    ///
    /// # Arguments
    /// * `title` - Short description, e.g. "Uploading files"
    /// * `icon` - Icon name understood by the notification backend
    async fn notify_foreground_activity(&self, title: &str, icon: &str) -> anyhow::Result<()>;

    /// Removes the indicator raised by `notify_foreground_activity`
    async fn clear_foreground_activity(&self) -> anyhow::Result<()>;

    /// Reports a caught failure to the user
    async fn notify_error(&self, message: &str) -> anyhow::Result<()>;
}
