//! Notification service adapters
//!
//! [`LogNotifier`] writes every notification to the log. [`DesktopNotifier`]
//! also raises freedesktop notifications on the session bus: a resident
//! one while a job runs and a critical one per error.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zbus::zvariant::Value;

use logship_core::ports::INotificationService;

const APP_NAME: &str = "logship";
const ERROR_ICON: &str = "dialog-error";
/// Urgency hint value for critical notifications
const URGENCY_CRITICAL: u8 = 2;

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;
}

// ============================================================================
// LogNotifier
// ============================================================================

/// Notifier that only logs
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl INotificationService for LogNotifier {
    async fn notify_foreground_activity(&self, title: &str, icon: &str) -> Result<()> {
        info!(title, icon, "Activity started");
        Ok(())
    }

    async fn clear_foreground_activity(&self) -> Result<()> {
        debug!("Activity ended");
        Ok(())
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        warn!(message, "User notification");
        Ok(())
    }
}

// ============================================================================
// DesktopNotifier
// ============================================================================

/// Notifier backed by `org.freedesktop.Notifications`
pub struct DesktopNotifier {
    connection: zbus::Connection,
    /// Id of the resident activity notification, if shown
    activity: Mutex<Option<u32>>,
}

impl DesktopNotifier {
    /// Connects to the session bus
    ///
    /// # Errors
    /// Returns an error if there is no session bus.
    pub async fn connect() -> Result<Self> {
        let connection = zbus::Connection::session()
            .await
            .context("Failed to connect to the session bus")?;
        Ok(Self {
            connection,
            activity: Mutex::new(None),
        })
    }

    async fn proxy(&self) -> Result<NotificationsProxy<'_>> {
        NotificationsProxy::new(&self.connection)
            .await
            .context("Failed to create notifications proxy")
    }

    fn take_activity(&self) -> Option<u32> {
        self.activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[async_trait::async_trait]
impl INotificationService for DesktopNotifier {
    async fn notify_foreground_activity(&self, title: &str, icon: &str) -> Result<()> {
        LogNotifier.notify_foreground_activity(title, icon).await?;

        let replaces = self.take_activity().unwrap_or(0);
        let mut hints = HashMap::new();
        hints.insert("resident", Value::from(true));
        let id = self
            .proxy()
            .await?
            .notify(APP_NAME, replaces, icon, title, "", &[], hints, 0)
            .await
            .context("Failed to show activity notification")?;
        *self.activity.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
        Ok(())
    }

    async fn clear_foreground_activity(&self) -> Result<()> {
        LogNotifier.clear_foreground_activity().await?;

        let Some(id) = self.take_activity() else {
            return Ok(());
        };
        self.proxy()
            .await?
            .close_notification(id)
            .await
            .context("Failed to close activity notification")
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        LogNotifier.notify_error(message).await?;

        let mut hints = HashMap::new();
        hints.insert("urgency", Value::from(URGENCY_CRITICAL));
        self.proxy()
            .await?
            .notify(APP_NAME, 0, ERROR_ICON, "Upload error", message, &[], hints, -1)
            .await
            .context("Failed to show error notification")?;
        Ok(())
    }
}
