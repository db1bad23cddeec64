//! New photo detection
//!
//! Compares the current local photo set against the last check time and
//! reports photos created since then, firing a throttled notification.

use chrono::{DateTime, Duration, Utc};

use crate::data::LocalPhoto;
use crate::notify::{Notification, Notifier};

pub struct GalleryMonitor {
    notifier: Notifier,
    throttle: Duration,
    last_check: DateTime<Utc>,
    last_notification: Option<DateTime<Utc>>,
}

impl GalleryMonitor {
    /// Monitor that treats every photo as new on the first check
    pub fn new(notifier: Notifier, throttle: Duration) -> Self {
        Self::since(notifier, throttle, DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Monitor that only reports photos created after `last_check`
    pub fn since(notifier: Notifier, throttle: Duration, last_check: DateTime<Utc>) -> Self {
        Self {
            notifier,
            throttle,
            last_check,
            last_notification: None,
        }
    }

    pub fn last_check(&self) -> DateTime<Utc> {
        self.last_check
    }

    pub fn detect(&mut self, photos: &[LocalPhoto]) -> Vec<LocalPhoto> {
        self.detect_at(photos, Utc::now())
    }

    /// Photos created after the last check, evaluated at `now`
    ///
    /// The check time only advances when something new was found.
    pub fn detect_at(&mut self, photos: &[LocalPhoto], now: DateTime<Utc>) -> Vec<LocalPhoto> {
        let since = self.last_check.timestamp_millis();
        let new_photos: Vec<LocalPhoto> = photos
            .iter()
            .filter(|photo| photo.creation_time > since)
            .cloned()
            .collect();

        if new_photos.is_empty() {
            return new_photos;
        }

        self.last_check = now;

        let throttled = self
            .last_notification
            .is_some_and(|last| now - last <= self.throttle);
        if throttled {
            tracing::debug!(count = new_photos.len(), "New photos found, notification throttled");
        } else {
            self.notifier.notify(Notification::new_photos(new_photos.len()));
            self.last_notification = Some(now);
        }

        new_photos
    }
}
