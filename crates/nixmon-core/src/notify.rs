//! Notification sink boundary.
//!
//! The core hands a `(title, body)` pair to a [`Notifier`]; delivery
//! mechanics, retries, and dismissal live outside. The default
//! implementation shells out to `notify-send`, which reaches whatever
//! desktop notification daemon the session runs.

use async_trait::async_trait;

use crate::error::NotifyError;

/// Sink for the coalesced run summary.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Desktop notifications via the `notify-send` CLI.
#[derive(Debug, Clone)]
pub struct NotifySendNotifier {
    /// Icon name passed to the notification daemon.
    pub icon: String,
}

impl Default for NotifySendNotifier {
    fn default() -> Self {
        NotifySendNotifier {
            icon: "dialog-warning".to_string(),
        }
    }
}

#[async_trait]
impl Notifier for NotifySendNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let status = tokio::process::Command::new("notify-send")
            .args(["--app-name", "nixmon", "--icon", &self.icon, title, body])
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(status))
        }
    }
}
