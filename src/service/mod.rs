//! Service layer
//!
//! Photo organization and synchronization logic sitting between the
//! persisted state in `data` and the remote client.

mod albums;
mod gallery;
mod grouping;
mod media;
mod monitor;
mod registry;
mod upload_queue;

pub use albums::AlbumStore;
pub use gallery::{GalleryService, NETWORK_ERROR_MESSAGE};
pub use grouping::{group_photos_by_month, group_photos_by_month_at, merge_sources};
pub use media::{describe_file, local_photo_id, path_to_uri, scan_directory, uri_to_path};
pub use monitor::GalleryMonitor;
pub use registry::UploadedPhotoRegistry;
pub use upload_queue::{MAX_RETRIES, QueueReport, UploadQueue};
