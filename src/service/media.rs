//! Local media access
//!
//! Scans a directory tree for images and converts between local file
//! references (`file://` URIs or plain paths) and filesystem paths.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::data::LocalPhoto;
use crate::error::AppError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif", "webp", "gif"];

/// Resolve a local file reference to a path
///
/// # Errors
/// Returns `Validation` for a `file:` URI that does not name a local path
pub fn uri_to_path(uri: &str) -> Result<PathBuf, AppError> {
    if !uri.starts_with("file:") {
        return Ok(PathBuf::from(uri));
    }

    let parsed = url::Url::parse(uri)
        .map_err(|e| AppError::Validation(format!("Invalid file URI {}: {}", uri, e)))?;
    parsed
        .to_file_path()
        .map_err(|_| AppError::Validation(format!("URI is not a local file: {}", uri)))
}

/// `file://` URI for an absolute path; other paths are returned as-is
pub fn path_to_uri(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Stable device-unique id derived from the canonical path
pub fn local_photo_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn epoch_millis(time: std::io::Result<SystemTime>) -> i64 {
    time.ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn photo_from_metadata(path: &Path, metadata: &std::fs::Metadata) -> LocalPhoto {
    let modification_time = epoch_millis(metadata.modified());
    let creation_time = match epoch_millis(metadata.created()) {
        0 => modification_time,
        millis => millis,
    };

    LocalPhoto {
        id: local_photo_id(path),
        uri: path_to_uri(path),
        creation_time,
        modification_time,
    }
}

/// Describe a single local file the same way a directory scan would
pub fn describe_file(path: &Path) -> Result<LocalPhoto, AppError> {
    let path = std::fs::canonicalize(path)?;
    let metadata = std::fs::metadata(&path)?;
    Ok(photo_from_metadata(&path, &metadata))
}

/// Collect every image below `root`
///
/// Creation time falls back to modification time when the platform
/// does not report it. Unreadable entries below the root are logged and
/// skipped.
///
/// # Errors
/// `PermissionDenied` when `root` itself cannot be read, `Io` when it
/// does not exist
pub fn scan_directory(root: &Path) -> Result<Vec<LocalPhoto>, AppError> {
    if let Err(error) = std::fs::read_dir(root) {
        return Err(match error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                AppError::PermissionDenied(format!("Cannot read media directory {}", root.display()))
            }
            _ => AppError::Io(error),
        });
    }

    let mut photos = Vec::new();
    for entry in walkdir::WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(%error, "Skipping unreadable media entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::warn!(path = %entry.path().display(), %error, "Skipping media file without metadata");
                continue;
            }
        };

        let path = std::fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        photos.push(photo_from_metadata(&path, &metadata));
    }

    tracing::info!(root = %root.display(), count = photos.len(), "Scanned local media");
    Ok(photos)
}
