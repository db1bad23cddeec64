//! Gallery service
//!
//! Front door for the UI layer. Wraps the remote client, the listing
//! cache and the uploaded-photo registry, and turns their errors into
//! the safe defaults a screen can render: an empty list, `None`, or an
//! unsuccessful upload response.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::grouping::{group_photos_by_month, merge_sources};
use super::registry::UploadedPhotoRegistry;
use crate::client::{PhotoApiClient, PhotoUploader, UploadResponse};
use crate::data::{LocalPhoto, PhotoCache, PhotoGroup, ServerPhoto};

/// Message reported when an immediate upload never reached the server
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";

pub struct GalleryService {
    api: Arc<PhotoApiClient>,
    uploader: Arc<dyn PhotoUploader>,
    cache: Arc<PhotoCache>,
    registry: Arc<UploadedPhotoRegistry>,
    in_flight: Mutex<HashSet<String>>,
}

/// Clears an in-flight marker when the upload finishes, however it ends
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    photo_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.photo_id);
    }
}

impl GalleryService {
    pub fn new(
        api: Arc<PhotoApiClient>,
        uploader: Arc<dyn PhotoUploader>,
        cache: Arc<PhotoCache>,
        registry: Arc<UploadedPhotoRegistry>,
    ) -> Self {
        Self {
            api,
            uploader,
            cache,
            registry,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &PhotoCache {
        &self.cache
    }

    /// Server listing, served from the cache while it is fresh
    ///
    /// A successful remote fetch refreshes the cache. Any failure
    /// yields an empty list.
    pub async fn fetch_server_photos(&self, folder_id: Option<&str>) -> Vec<ServerPhoto> {
        match self.cache.get_cached().await {
            Ok(Some(photos)) => {
                tracing::debug!(count = photos.len(), "Serving server photos from cache");
                return photos;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache read failed, fetching from server"),
        }

        match self.api.list_photos(folder_id).await {
            Ok(photos) => {
                if let Err(e) = self.cache.set_cached(&photos).await {
                    tracing::warn!(error = %e, "Failed to cache server photos");
                }
                photos
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching server photos");
                Vec::new()
            }
        }
    }

    /// Drop the cached listing and fetch it again
    pub async fn refresh_server_photos(&self, folder_id: Option<&str>) -> Vec<ServerPhoto> {
        if let Err(e) = self.cache.clear_cached().await {
            tracing::warn!(error = %e, "Failed to clear server photo cache");
        }
        self.fetch_server_photos(folder_id).await
    }

    pub fn is_uploading(&self, photo_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(photo_id)
    }

    pub async fn is_uploaded(&self, photo_id: &str) -> bool {
        match self.registry.contains(photo_id).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                tracing::warn!(photo_id = %photo_id, error = %e, "Registry lookup failed");
                false
            }
        }
    }

    /// Upload one photo right away, outside the queue
    ///
    /// Photos already registered or already in flight are not sent again.
    /// A transport failure is reported as `Network error occurred`.
    pub async fn upload_now(&self, path: &Path, photo_id: &str) -> UploadResponse {
        use crate::metrics::UPLOADS_TOTAL;

        if self.is_uploaded(photo_id).await {
            tracing::info!(photo_id = %photo_id, "Photo already uploaded, skipping");
            return UploadResponse {
                success: true,
                msg: Some("Photo already uploaded".to_string()),
            };
        }

        let _guard = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !in_flight.insert(photo_id.to_string()) {
                return UploadResponse::failed("Upload already in progress");
            }
            InFlightGuard {
                in_flight: &self.in_flight,
                photo_id: photo_id.to_string(),
            }
        };

        match self.uploader.upload(path).await {
            Ok(response) if response.success => {
                UPLOADS_TOTAL.with_label_values(&["immediate", "success"]).inc();
                if let Err(e) = self.registry.add(photo_id).await {
                    tracing::error!(photo_id = %photo_id, error = %e, "Failed to register uploaded photo");
                }
                tracing::info!(photo_id = %photo_id, path = %path.display(), "Photo uploaded");
                response
            }
            Ok(response) => {
                UPLOADS_TOTAL.with_label_values(&["immediate", "failure"]).inc();
                tracing::warn!(
                    photo_id = %photo_id,
                    msg = ?response.msg,
                    "Server rejected upload"
                );
                response
            }
            Err(e) => {
                UPLOADS_TOTAL.with_label_values(&["immediate", "failure"]).inc();
                tracing::error!(photo_id = %photo_id, error = %e, "Error uploading photo");
                UploadResponse::failed(NETWORK_ERROR_MESSAGE)
            }
        }
    }

    /// Local and server photos merged into month groups, newest first
    pub fn timeline(&self, local: &[LocalPhoto], server: &[ServerPhoto]) -> Vec<PhotoGroup> {
        group_photos_by_month(&merge_sources(local, server))
    }

    pub async fn download_photo(&self, photo: &ServerPhoto, dir: &Path) -> Option<PathBuf> {
        match self.api.download_photo(photo, dir).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(photo_id = %photo.id, error = %e, "Error downloading photo");
                None
            }
        }
    }
}
