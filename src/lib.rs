//! PhotoSync - photo organization and synchronization for a personal gallery
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CLI (main.rs)                          │
//! │  - list / scan / upload / download / albums                 │
//! │  - queue sweeps and the watch loop                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Month grouping, upload queue, registry, albums           │
//! │  - Gallery facade and new photo monitor                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │         Data Layer           │ │        Remote Client       │
//! │  - SQLite key/value blobs    │ │  - /photos/list            │
//! │  - Listing cache             │ │  - /photos/upload          │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `client`: HTTP client for the photo server
//! - `service`: Business logic layer
//! - `data`: Persistence and caches
//! - `notify`: Local notification channel
//! - `config`: Configuration management
//! - `error`: Error types

pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod service;

use std::sync::Arc;

/// Application state shared by every command
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Key/value blob store
    pub store: Arc<data::Store>,

    /// Photo server client
    pub api: Arc<client::PhotoApiClient>,

    /// Local notification channel
    pub notifier: notify::Notifier,

    /// Listing cache, immediate uploads, downloads and timeline
    pub gallery: Arc<service::GalleryService>,

    /// Persisted upload queue
    pub queue: Arc<service::UploadQueue>,

    /// Ids of photos known to be on the server
    pub registry: Arc<service::UploadedPhotoRegistry>,

    /// User albums
    pub albums: Arc<service::AlbumStore>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Open the SQLite store and run migrations
    /// 2. Build the photo server client
    /// 3. Wire the services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Open store
        let store = Arc::new(data::Store::connect(&config.storage.database_path).await?);
        tracing::info!(path = %config.storage.database_path.display(), "Store opened");

        // 2. Photo server client
        let api = Arc::new(client::PhotoApiClient::new(&config.api)?);
        tracing::info!(base_url = %config.api.base_url, "Photo API client initialized");

        Ok(Self::with_parts(config, store, api))
    }

    /// Wire services around an already opened store and client
    pub fn with_parts(
        config: config::AppConfig,
        store: Arc<data::Store>,
        api: Arc<client::PhotoApiClient>,
    ) -> Self {
        let notifier = notify::Notifier::default();
        let uploader: Arc<dyn client::PhotoUploader> = api.clone();

        let cache = Arc::new(data::PhotoCache::new(
            store.clone(),
            config.cache.listing_ttl(),
        ));
        let registry = Arc::new(service::UploadedPhotoRegistry::new(store.clone()));
        let gallery = Arc::new(service::GalleryService::new(
            api.clone(),
            uploader.clone(),
            cache,
            registry.clone(),
        ));
        let queue = Arc::new(service::UploadQueue::new(
            store.clone(),
            uploader,
            notifier.clone(),
            config.queue.max_retries,
        ));
        let albums = Arc::new(service::AlbumStore::new(store.clone()));

        tracing::info!("Application state initialized successfully");

        Self {
            config: Arc::new(config),
            store,
            api,
            notifier,
            gallery,
            queue,
            registry,
            albums,
        }
    }

    /// New photo monitor configured from `monitor.notification_throttle_ms`
    ///
    /// Only photos created after `since` are reported.
    pub fn monitor_since(&self, since: chrono::DateTime<chrono::Utc>) -> service::GalleryMonitor {
        let throttle =
            chrono::Duration::milliseconds(self.config.monitor.notification_throttle_ms as i64);
        service::GalleryMonitor::since(self.notifier.clone(), throttle, since)
    }
}
