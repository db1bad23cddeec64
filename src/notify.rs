//! Local notifications
//!
//! Human-readable messages fired on enqueue, upload success and new
//! photo detection. Every notification is logged; subscribers (a UI,
//! a desktop notifier, tests) receive them over a broadcast channel.

use serde::Serialize;
use tokio::sync::broadcast;

/// What triggered a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    UploadQueued,
    UploadSucceeded,
    NewPhotos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn upload(kind: NotificationKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: "Photo Upload".to_string(),
            body: body.into(),
        }
    }

    /// "N new photo(s) found in your gallery"
    pub fn new_photos(count: usize) -> Self {
        let plural = if count > 1 { "s" } else { "" };
        Self {
            kind: NotificationKind::NewPhotos,
            title: "New Photos Detected".to_string(),
            body: format!("{} new photo{} found in your gallery", count, plural),
        }
    }
}

/// Fan-out point for notifications
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    /// Create a notifier buffering up to `capacity` undelivered messages
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Log and broadcast; having no subscribers is fine
    pub fn notify(&self, notification: Notification) {
        tracing::info!(
            kind = ?notification.kind,
            title = %notification.title,
            "{}",
            notification.body
        );
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(100)
    }
}
