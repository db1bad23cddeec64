//! Server listing cache and visible-window tracking
//!
//! The listing cache is persisted so it survives restarts; the visible
//! window is volatile and owned by whoever drives scrolling.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use super::models::{CachedPhotoListing, Identified, ServerPhoto};
use super::store::{SERVER_PHOTOS_CACHE_KEY, Store};
use crate::error::AppError;

/// Default visible window size
pub const DEFAULT_WINDOW_SIZE: usize = 20;

// =============================================================================
// Photo Cache
// =============================================================================

/// Time-boxed persisted copy of the server photo listing
///
/// A listing is served while `now - timestamp < ttl` and removed on
/// the first read after that.
pub struct PhotoCache {
    store: Arc<Store>,
    ttl: Duration,
}

impl PhotoCache {
    /// Create new listing cache
    ///
    /// # Arguments
    /// * `store` - Backing blob store
    /// * `ttl` - Validity window (2 days by default config)
    pub fn new(store: Arc<Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the cached listing if it is still fresh
    pub async fn get_cached(&self) -> Result<Option<Vec<ServerPhoto>>, AppError> {
        self.get_cached_at(Utc::now()).await
    }

    /// Same as [`PhotoCache::get_cached`] evaluated at `now`
    pub async fn get_cached_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<ServerPhoto>>, AppError> {
        use crate::metrics::{CACHE_EXPIRED_TOTAL, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

        let Some(listing) = self
            .store
            .get::<CachedPhotoListing>(SERVER_PHOTOS_CACHE_KEY)
            .await?
        else {
            CACHE_MISSES_TOTAL.inc();
            return Ok(None);
        };

        // a corrupt timestamp that cannot produce an age counts as expired
        let age = now.timestamp_millis().checked_sub(listing.timestamp);
        if let Some(age) = age.filter(|age| *age < self.ttl.num_milliseconds()) {
            CACHE_HITS_TOTAL.inc();
            tracing::debug!(photos = listing.photos.len(), age_ms = age, "Listing cache hit");
            return Ok(Some(listing.photos));
        }

        tracing::info!(age_ms = ?age, "Listing cache expired, removing");
        CACHE_EXPIRED_TOTAL.inc();
        self.store.remove(SERVER_PHOTOS_CACHE_KEY).await?;
        Ok(None)
    }

    /// Replace the cached listing, stamped with the current time
    pub async fn set_cached(&self, photos: &[ServerPhoto]) -> Result<(), AppError> {
        self.set_cached_at(photos, Utc::now()).await
    }

    /// Replace the cached listing, stamped with `now`
    pub async fn set_cached_at(
        &self,
        photos: &[ServerPhoto],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let listing = CachedPhotoListing {
            timestamp: now.timestamp_millis(),
            photos: photos.to_vec(),
        };
        self.store.set(SERVER_PHOTOS_CACHE_KEY, &listing).await?;
        tracing::debug!(photos = photos.len(), "Listing cache updated");
        Ok(())
    }

    /// Drop the cached listing unconditionally
    pub async fn clear_cached(&self) -> Result<(), AppError> {
        self.store.remove(SERVER_PHOTOS_CACHE_KEY).await?;
        tracing::info!("Listing cache cleared");
        Ok(())
    }
}

// =============================================================================
// Visible Window
// =============================================================================

/// Photo ids currently on or near the screen
///
/// Every update replaces the whole set.
#[derive(Debug, Clone)]
pub struct VisibleWindow {
    ids: HashSet<String>,
    window_size: usize,
}

impl VisibleWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            ids: HashSet::new(),
            window_size,
        }
    }

    /// Track `photos[start_index..start_index + window_size]`, clamped to bounds
    pub fn update<P: Identified>(&mut self, photos: &[P], start_index: usize) {
        self.update_with_size(photos, start_index, self.window_size);
    }

    /// Like [`VisibleWindow::update`] with an explicit window size
    pub fn update_with_size<P: Identified>(
        &mut self,
        photos: &[P],
        start_index: usize,
        window_size: usize,
    ) {
        let start = start_index.min(photos.len());
        let end = start.saturating_add(window_size).min(photos.len());

        self.ids = photos[start..end]
            .iter()
            .map(|photo| photo.id().to_string())
            .collect();

        tracing::trace!(start, end, tracked = self.ids.len(), "Visible window updated");
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for VisibleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
