//! User-visible notifications.
//!
//! The core never shows anything itself. It sends notifications through a
//! channel and whoever owns the receiving end (a CLI, a desktop shell)
//! decides how to present them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Something the user should see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A conversion failed.
    Error {
        title: String,
        message: String,
        /// Display name of the input, if the error concerns one file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<String>,
    },
    /// A batch ended.
    BatchDone { message: String, error_count: usize },
}

/// Envelope wrapping a notification with the time it was sent.
#[derive(Debug, Clone)]
pub struct NotificationEnvelope {
    pub timestamp: DateTime<Utc>,
    pub notification: Notification,
}

/// Handle for sending notifications.
///
/// Cheaply cloneable. Sending never blocks; a full or closed channel only
/// logs.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationEnvelope>,
}

impl Notifier {
    pub fn new(tx: mpsc::Sender<NotificationEnvelope>) -> Self {
        Self { tx }
    }

    /// Creates a notifier and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends a notification without blocking.
    ///
    /// Returns true if it was queued.
    pub fn notify(&self, notification: Notification) -> bool {
        let envelope = NotificationEnvelope {
            timestamp: Utc::now(),
            notification,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send notification: {}", e);
                false
            }
        }
    }
}
