//! Data layer module
//!
//! Handles all persistence:
//! - SQLite key/value blob store
//! - Server listing cache (persisted)
//! - Visible window (volatile)

mod cache;
mod models;
mod store;

pub use cache::{DEFAULT_WINDOW_SIZE, PhotoCache, VisibleWindow};
pub use models::*;
pub use store::{
    ALBUMS_KEY, PHOTOS_KEY, SERVER_PHOTOS_CACHE_KEY, Store, UPLOAD_QUEUE_KEY, UPLOADED_PHOTOS_KEY,
};
