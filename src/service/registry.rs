//! Uploaded photo registry
//!
//! Append-only set of photo ids known to be on the server. Drives the
//! "upload" versus "already uploaded" affordance.

use std::sync::Arc;

use crate::data::{Store, UPLOADED_PHOTOS_KEY};
use crate::error::AppError;

pub struct UploadedPhotoRegistry {
    store: Arc<Store>,
}

impl UploadedPhotoRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// All registered ids in insertion order
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .store
            .get::<Vec<String>>(UPLOADED_PHOTOS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn contains(&self, photo_id: &str) -> Result<bool, AppError> {
        Ok(self.list().await?.iter().any(|id| id == photo_id))
    }

    /// Register `photo_id`; returns `false` if it was already present
    pub async fn add(&self, photo_id: &str) -> Result<bool, AppError> {
        let inserted = self
            .store
            .update::<Vec<String>, _, _>(UPLOADED_PHOTOS_KEY, |ids| {
                if ids.iter().any(|id| id == photo_id) {
                    false
                } else {
                    ids.push(photo_id.to_string());
                    true
                }
            })
            .await?;

        if inserted {
            tracing::debug!(photo_id = %photo_id, "Registered uploaded photo");
        }
        Ok(inserted)
    }
}
