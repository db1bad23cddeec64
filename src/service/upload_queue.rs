//! Persisted upload queue
//!
//! Items move `pending -> uploading -> completed | failed`. A failed
//! item is retried on later sweeps until it has failed `max_retries`
//! times; after that it stays persisted and is skipped. Sweeps are
//! triggered from outside (timer, app resume, CLI) and handle one item
//! at a time.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::media::uri_to_path;
use crate::client::PhotoUploader;
use crate::data::{
    PHOTOS_KEY, Store, UPLOAD_QUEUE_KEY, UploadMetadata, UploadQueueItem, UploadStatus,
    UploadedPhotoRecord,
};
use crate::error::AppError;
use crate::notify::{Notification, NotificationKind, Notifier};

/// Attempts per item before it is skipped for good
pub const MAX_RETRIES: u32 = 3;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    /// Items in `pending`, `failed` or stranded in `uploading`
    pub selected: usize,
    /// Items skipped because their retries ran out
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Completed items dropped from storage at the end of the sweep
    pub removed: usize,
}

/// Upload queue service
pub struct UploadQueue {
    store: Arc<Store>,
    uploader: Arc<dyn PhotoUploader>,
    notifier: Notifier,
    max_retries: u32,
    sweep_lock: Mutex<()>,
}

impl UploadQueue {
    /// Create new upload queue
    ///
    /// # Arguments
    /// * `store` - Backing blob store
    /// * `uploader` - Performs the actual network upload
    /// * `notifier` - Receives "queued" and "uploaded" notifications
    /// * `max_retries` - Failures tolerated per item
    pub fn new(
        store: Arc<Store>,
        uploader: Arc<dyn PhotoUploader>,
        notifier: Notifier,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            uploader,
            notifier,
            max_retries,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Append a pending item for `uri`
    ///
    /// Enqueuing the same URI twice yields two independent items.
    pub async fn enqueue(
        &self,
        uri: &str,
        metadata: UploadMetadata,
    ) -> Result<UploadQueueItem, AppError> {
        let item = UploadQueueItem::new(uri, metadata);

        let queue_len = self
            .store
            .update::<Vec<UploadQueueItem>, _, _>(UPLOAD_QUEUE_KEY, |queue| {
                queue.push(item.clone());
                queue.len()
            })
            .await?;

        crate::metrics::UPLOAD_QUEUE_LENGTH.set(queue_len as i64);
        tracing::info!(uri = %uri, queue_len, "Added to upload queue");

        self.notifier.notify(Notification::upload(
            NotificationKind::UploadQueued,
            "Photo added to upload queue",
        ));

        Ok(item)
    }

    /// Load the persisted queue; nothing stored (or a corrupt blob) is empty
    pub async fn get_queue(&self) -> Result<Vec<UploadQueueItem>, AppError> {
        let queue: Vec<UploadQueueItem> = self
            .store
            .get(UPLOAD_QUEUE_KEY)
            .await?
            .unwrap_or_default();
        tracing::debug!(queue_len = queue.len(), "Loaded upload queue");
        Ok(queue)
    }

    /// Set the status of the first item whose URI matches
    ///
    /// `error` is only written when given. Returns `false` (and logs)
    /// when no item matches.
    pub async fn update_status(
        &self,
        uri: &str,
        status: UploadStatus,
        error: Option<&str>,
    ) -> Result<bool, AppError> {
        let found = self
            .store
            .update::<Vec<UploadQueueItem>, _, _>(UPLOAD_QUEUE_KEY, |queue| {
                match queue.iter_mut().find(|item| item.uri == uri) {
                    Some(item) => {
                        item.status = status;
                        if let Some(error) = error {
                            item.error = Some(error.to_string());
                        }
                        true
                    }
                    None => false,
                }
            })
            .await?;

        if found {
            tracing::debug!(uri = %uri, %status, "Upload status updated");
        } else {
            tracing::warn!(uri = %uri, "Item not found in upload queue");
        }
        Ok(found)
    }

    async fn update_item<F>(&self, id: &str, mutate: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut UploadQueueItem) + Send,
    {
        let found = self
            .store
            .update::<Vec<UploadQueueItem>, _, _>(UPLOAD_QUEUE_KEY, |queue| {
                match queue.iter_mut().find(|item| item.id == id) {
                    Some(item) => {
                        mutate(item);
                        true
                    }
                    None => false,
                }
            })
            .await?;

        if !found {
            tracing::warn!(item_id = %id, "Queue item vanished during processing");
        }
        Ok(found)
    }

    /// Run one sweep over the queue
    ///
    /// # Steps
    /// 1. Select items in `pending` or `failed`, plus items left
    ///    `uploading` by an interrupted sweep
    /// 2. For each, in order: skip if retries are exhausted, otherwise
    ///    mark `uploading` and attempt the upload; a failure bumps
    ///    `retry_count` and leaves the item `failed`
    /// 3. Drop `completed` items from storage
    ///
    /// Concurrent callers wait for the running sweep to finish.
    pub async fn process_queue(&self) -> Result<QueueReport, AppError> {
        let _sweep = self.sweep_lock.lock().await;

        // writing the blob back pins ids on items stored without one
        let queue = self
            .store
            .update::<Vec<UploadQueueItem>, _, _>(UPLOAD_QUEUE_KEY, |queue| queue.clone())
            .await?;
        let selected: Vec<UploadQueueItem> = queue
            .into_iter()
            .filter(|item| {
                matches!(
                    item.status,
                    UploadStatus::Pending | UploadStatus::Failed | UploadStatus::Uploading
                )
            })
            .collect();

        let mut report = QueueReport {
            selected: selected.len(),
            ..QueueReport::default()
        };
        tracing::info!(pending = selected.len(), "Processing upload queue");

        for item in selected {
            if item.retry_count >= self.max_retries {
                tracing::debug!(uri = %item.uri, retries = item.retry_count, "Max retries reached, skipping");
                report.skipped += 1;
                continue;
            }

            self.update_item(&item.id, |queued| queued.status = UploadStatus::Uploading)
                .await?;

            if self.process_photo(&item).await {
                report.succeeded += 1;
                continue;
            }

            report.failed += 1;
            self.update_item(&item.id, |queued| {
                queued.retry_count += 1;
                queued.status = UploadStatus::Failed;
                if queued.error.is_none() {
                    queued.error = Some("Upload failed".to_string());
                }
            })
            .await?;
        }

        let (removed, remaining, abandoned) = self
            .store
            .update::<Vec<UploadQueueItem>, _, _>(UPLOAD_QUEUE_KEY, |queue| {
                let before = queue.len();
                queue.retain(|item| item.status != UploadStatus::Completed);
                let abandoned = queue
                    .iter()
                    .filter(|item| item.retry_count >= self.max_retries)
                    .count();
                (before - queue.len(), queue.len(), abandoned)
            })
            .await?;
        report.removed = removed;

        crate::metrics::UPLOAD_QUEUE_LENGTH.set(remaining as i64);
        crate::metrics::UPLOAD_QUEUE_ABANDONED.set(abandoned as i64);

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            removed = report.removed,
            "Upload queue sweep complete"
        );

        Ok(report)
    }

    /// Upload one queued item and record the outcome on it
    ///
    /// On success the item becomes `completed`, its metadata is
    /// appended to the uploaded-photo log and a notification fires.
    /// On failure the item becomes `failed` with the error message.
    pub async fn process_photo(&self, item: &UploadQueueItem) -> bool {
        use crate::metrics::UPLOADS_TOTAL;

        tracing::debug!(uri = %item.uri, "Processing photo");

        match self.try_upload(item).await {
            Ok(()) => {
                if let Err(error) = self
                    .update_item(&item.id, |queued| {
                        queued.status = UploadStatus::Completed;
                        queued.error = None;
                    })
                    .await
                {
                    // left `uploading`; the next sweep picks it up again
                    tracing::error!(uri = %item.uri, %error, "Failed to mark upload completed");
                }

                UPLOADS_TOTAL.with_label_values(&["queue", "success"]).inc();
                self.notifier.notify(Notification::upload(
                    NotificationKind::UploadSucceeded,
                    "Photo uploaded successfully",
                ));
                true
            }
            Err(error) => {
                tracing::warn!(uri = %item.uri, %error, "Error processing photo");
                UPLOADS_TOTAL.with_label_values(&["queue", "failure"]).inc();

                let message = error.to_string();
                if let Err(error) = self
                    .update_item(&item.id, |queued| {
                        queued.status = UploadStatus::Failed;
                        queued.error = Some(message);
                    })
                    .await
                {
                    tracing::error!(uri = %item.uri, %error, "Failed to mark upload failed");
                }
                false
            }
        }
    }

    async fn try_upload(&self, item: &UploadQueueItem) -> Result<(), AppError> {
        let path = uri_to_path(&item.uri)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::Upload("File does not exist".to_string()));
        }

        let response = self.uploader.upload(&path).await?;
        if !response.success {
            return Err(AppError::Upload(
                response.msg.unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }

        let record = UploadedPhotoRecord {
            uri: item.uri.clone(),
            creation_time: item.creation_time.clone(),
            modification_time: item.modification_time.clone(),
            upload_time: Utc::now().to_rfc3339(),
        };
        // the photo is on the server; a lost log entry must not cause a re-upload
        if let Err(error) = self
            .store
            .update::<Vec<UploadedPhotoRecord>, _, _>(PHOTOS_KEY, |photos| photos.push(record))
            .await
        {
            tracing::error!(uri = %item.uri, %error, "Failed to record uploaded photo");
        }

        Ok(())
    }

    /// Items whose retries are exhausted; they are never attempted again
    pub async fn abandoned(&self) -> Result<Vec<UploadQueueItem>, AppError> {
        let queue = self.get_queue().await?;
        Ok(queue
            .into_iter()
            .filter(|item| item.retry_count >= self.max_retries)
            .collect())
    }

    /// Metadata log of photos uploaded through the queue
    pub async fn uploaded_photos(&self) -> Result<Vec<UploadedPhotoRecord>, AppError> {
        Ok(self.store.get(PHOTOS_KEY).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockPhotoUploader, UploadResponse};
    use tempfile::TempDir;

    struct Fixture {
        queue: UploadQueue,
        notifier: Notifier,
        temp_dir: TempDir,
    }

    async fn fixture(uploader: MockPhotoUploader) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::connect(&temp_dir.path().join("queue.db")).await.unwrap();
        let notifier = Notifier::default();
        let queue = UploadQueue::new(
            Arc::new(store),
            Arc::new(uploader),
            notifier.clone(),
            MAX_RETRIES,
        );
        Fixture {
            queue,
            notifier,
            temp_dir,
        }
    }

    fn photo_file(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, b"\xFF\xD8\xFF\xE0fake-jpeg").unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_enqueue_adds_one_pending_item() {
        let fx = fixture(MockPhotoUploader::new()).await;
        let mut rx = fx.notifier.subscribe();

        fx.queue
            .enqueue("file:///photos/a.jpg", UploadMetadata::default())
            .await
            .unwrap();

        let queue = fx.queue.get_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].uri, "file:///photos/a.jpg");
        assert_eq!(queue[0].status, UploadStatus::Pending);
        assert_eq!(queue[0].retry_count, 0);

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.body, "Photo added to upload queue");
    }

    #[tokio::test]
    async fn test_enqueue_does_not_deduplicate() {
        let fx = fixture(MockPhotoUploader::new()).await;

        fx.queue.enqueue("a.jpg", UploadMetadata::default()).await.unwrap();
        fx.queue.enqueue("a.jpg", UploadMetadata::default()).await.unwrap();

        let queue = fx.queue.get_queue().await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_ne!(queue[0].id, queue[1].id);
    }

    #[tokio::test]
    async fn test_update_status_targets_first_match_only() {
        let fx = fixture(MockPhotoUploader::new()).await;
        fx.queue.enqueue("a.jpg", UploadMetadata::default()).await.unwrap();
        fx.queue.enqueue("a.jpg", UploadMetadata::default()).await.unwrap();

        let found = fx
            .queue
            .update_status("a.jpg", UploadStatus::Failed, Some("disk full"))
            .await
            .unwrap();
        assert!(found);

        let queue = fx.queue.get_queue().await.unwrap();
        assert_eq!(queue[0].status, UploadStatus::Failed);
        assert_eq!(queue[0].error.as_deref(), Some("disk full"));
        assert_eq!(queue[1].status, UploadStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_unknown_uri_is_noop() {
        let fx = fixture(MockPhotoUploader::new()).await;
        fx.queue.enqueue("a.jpg", UploadMetadata::default()).await.unwrap();

        let found = fx
            .queue
            .update_status("missing.jpg", UploadStatus::Completed, None)
            .await
            .unwrap();
        assert!(!found);
        assert_eq!(
            fx.queue.get_queue().await.unwrap()[0].status,
            UploadStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_successful_sweep_removes_item_and_logs_upload() {
        let mut uploader = MockPhotoUploader::new();
        uploader
            .expect_upload()
            .times(1)
            .returning(|_| Ok(UploadResponse::ok()));
        let fx = fixture(uploader).await;
        let uri = photo_file(&fx.temp_dir, "a.jpg");

        fx.queue
            .enqueue(
                &uri,
                UploadMetadata {
                    creation_time: Some("2024-04-01T10:00:00Z".to_string()),
                    modification_time: None,
                },
            )
            .await
            .unwrap();

        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.removed, 1);
        assert!(fx.queue.get_queue().await.unwrap().is_empty());

        let uploaded = fx.queue.uploaded_photos().await.unwrap();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].uri, uri);
        assert_eq!(uploaded[0].creation_time.as_deref(), Some("2024-04-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_calling_uploader() {
        let mut uploader = MockPhotoUploader::new();
        uploader.expect_upload().never();
        let fx = fixture(uploader).await;

        fx.queue
            .enqueue("/nonexistent/photo.jpg", UploadMetadata::default())
            .await
            .unwrap();

        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.failed, 1);

        let queue = fx.queue.get_queue().await.unwrap();
        assert_eq!(queue[0].status, UploadStatus::Failed);
        assert_eq!(queue[0].retry_count, 1);
        assert_eq!(queue[0].error.as_deref(), Some("File does not exist"));
    }

    #[tokio::test]
    async fn test_item_is_abandoned_after_max_retries() {
        let mut uploader = MockPhotoUploader::new();
        uploader
            .expect_upload()
            .times(MAX_RETRIES as usize)
            .returning(|_| Ok(UploadResponse::failed("server busy")));
        let fx = fixture(uploader).await;
        assert_eq!(fx.queue.max_retries(), MAX_RETRIES);
        let uri = photo_file(&fx.temp_dir, "b.jpg");
        fx.queue.enqueue(&uri, UploadMetadata::default()).await.unwrap();

        for _ in 0..fx.queue.max_retries() {
            let report = fx.queue.process_queue().await.unwrap();
            assert_eq!(report.failed, 1);
        }

        let queue = fx.queue.get_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, UploadStatus::Failed);
        assert_eq!(queue[0].retry_count, 3);
        assert_eq!(queue[0].error.as_deref(), Some("server busy"));

        // a further sweep must not attempt the upload again
        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(fx.queue.get_queue().await.unwrap()[0].retry_count, 3);

        assert_eq!(fx.queue.abandoned().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_item_succeeds_on_retry() {
        let mut uploader = MockPhotoUploader::new();
        let mut calls = 0;
        uploader.expect_upload().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(AppError::Upload("connection reset".to_string()))
            } else {
                Ok(UploadResponse::ok())
            }
        });
        let fx = fixture(uploader).await;
        let uri = photo_file(&fx.temp_dir, "c.jpg");
        fx.queue.enqueue(&uri, UploadMetadata::default()).await.unwrap();

        let first = fx.queue.process_queue().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(fx.queue.get_queue().await.unwrap()[0].retry_count, 1);

        let second = fx.queue.process_queue().await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert!(fx.queue.get_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_uris_are_processed_independently() {
        let mut uploader = MockPhotoUploader::new();
        uploader
            .expect_upload()
            .times(2)
            .returning(|_| Ok(UploadResponse::ok()));
        let fx = fixture(uploader).await;
        let uri = photo_file(&fx.temp_dir, "d.jpg");
        fx.queue.enqueue(&uri, UploadMetadata::default()).await.unwrap();
        fx.queue.enqueue(&uri, UploadMetadata::default()).await.unwrap();

        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.removed, 2);
        assert!(fx.queue.get_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_item_stranded_in_uploading_is_retried() {
        let mut uploader = MockPhotoUploader::new();
        uploader
            .expect_upload()
            .times(1)
            .returning(|_| Ok(UploadResponse::ok()));
        let fx = fixture(uploader).await;
        let uri = photo_file(&fx.temp_dir, "f.jpg");
        fx.queue.enqueue(&uri, UploadMetadata::default()).await.unwrap();
        fx.queue
            .update_status(&uri, UploadStatus::Uploading, None)
            .await
            .unwrap();

        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(report.succeeded, 1);
        assert!(fx.queue.get_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_photo_log_does_not_cause_reupload() {
        use sqlx::Connection;
        use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};

        let mut uploader = MockPhotoUploader::new();
        uploader
            .expect_upload()
            .times(1)
            .returning(|_| Ok(UploadResponse::ok()));
        let fx = fixture(uploader).await;
        let uri = photo_file(&fx.temp_dir, "g.jpg");
        fx.queue.enqueue(&uri, UploadMetadata::default()).await.unwrap();

        let options = SqliteConnectOptions::new().filename(fx.temp_dir.path().join("queue.db"));
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::query(&format!(
            "CREATE TRIGGER reject_photo_log BEFORE INSERT ON kv_store \
             WHEN NEW.key = '{}' BEGIN SELECT RAISE(ABORT, 'read-only'); END",
            PHOTOS_KEY
        ))
        .execute(&mut conn)
        .await
        .unwrap();

        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(fx.queue.get_queue().await.unwrap().is_empty());
        assert!(fx.queue.uploaded_photos().await.unwrap().is_empty());

        // a second sweep has nothing left to upload
        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.selected, 0);
    }

    #[tokio::test]
    async fn test_items_stored_without_id_are_still_processed() {
        let mut uploader = MockPhotoUploader::new();
        uploader
            .expect_upload()
            .times(1)
            .returning(|_| Ok(UploadResponse::ok()));
        let fx = fixture(uploader).await;
        let uri = photo_file(&fx.temp_dir, "e.jpg");
        fx.queue
            .store
            .set(
                UPLOAD_QUEUE_KEY,
                &serde_json::json!([{ "uri": uri, "status": "pending", "retryCount": 0 }]),
            )
            .await
            .unwrap();

        let report = fx.queue.process_queue().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(fx.queue.get_queue().await.unwrap().is_empty());
    }
}
