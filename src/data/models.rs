//! Data models
//!
//! Rust structs for photo records, derived groups and the blobs
//! persisted in the key/value store. Persisted field names are
//! camelCase so stored blobs keep their established shape.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

fn new_entity_id() -> String {
    EntityId::new().0
}

/// Anything with a stable photo id
pub trait Identified {
    fn id(&self) -> &str;
}

// =============================================================================
// Photo records
// =============================================================================

/// A photo found in device media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPhoto {
    pub id: String,
    /// Local file reference (file:// URI or plain path)
    pub uri: String,
    /// Epoch millis; 0 when the platform did not report it
    #[serde(default)]
    pub creation_time: i64,
    /// Epoch millis; 0 when unknown
    #[serde(default)]
    pub modification_time: i64,
}

/// A photo listed by the remote server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPhoto {
    pub id: String,
    /// Full-resolution URL
    pub url: String,
    pub thumbnail_url: String,
    pub filename: String,
    /// ISO-8601
    pub uploaded_at: String,
    /// ISO-8601, falls back to `uploaded_at` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<String>,
}

/// Either kind of photo, as rendered by the gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum PhotoRecord {
    Local(LocalPhoto),
    Server(ServerPhoto),
}

impl Identified for LocalPhoto {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for ServerPhoto {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for PhotoRecord {
    fn id(&self) -> &str {
        match self {
            PhotoRecord::Local(photo) => &photo.id,
            PhotoRecord::Server(photo) => &photo.id,
        }
    }
}

impl From<LocalPhoto> for PhotoRecord {
    fn from(photo: LocalPhoto) -> Self {
        PhotoRecord::Local(photo)
    }
}

impl From<ServerPhoto> for PhotoRecord {
    fn from(photo: ServerPhoto) -> Self {
        PhotoRecord::Server(photo)
    }
}

impl LocalPhoto {
    /// Creation time, else modification time, else `now`
    pub fn effective_timestamp(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let millis = [self.creation_time, self.modification_time]
            .into_iter()
            .find(|millis| *millis > 0);

        match millis {
            Some(millis) => Utc.timestamp_millis_opt(millis).single(),
            None => Some(now),
        }
    }
}

impl ServerPhoto {
    /// Capture date, else upload date; `None` when the chosen value does not parse
    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self
            .capture_date
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(&self.uploaded_at);
        parse_timestamp(raw)
    }
}

impl PhotoRecord {
    pub fn effective_timestamp(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            PhotoRecord::Local(photo) => photo.effective_timestamp(now),
            PhotoRecord::Server(photo) => photo.effective_timestamp(),
        }
    }
}

/// Parse an ISO-8601 timestamp as sent by the server.
///
/// Accepts RFC 3339, zone-less date-times (treated as UTC) and plain dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Photos sharing one capture month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoGroup {
    /// Full English month name ("January")
    pub month: String,
    pub year: i32,
    /// Zero-based month index, 0 = January
    pub month_index: u32,
    /// Newest first
    pub photos: Vec<PhotoRecord>,
}

// =============================================================================
// Persisted blobs
// =============================================================================

/// Server listing plus the moment it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPhotoListing {
    /// Epoch millis of the fetch
    pub timestamp: i64,
    pub photos: Vec<ServerPhoto>,
}

/// Lifecycle of a queued upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional capture metadata attached on enqueue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    pub creation_time: Option<String>,
    pub modification_time: Option<String>,
}

/// One pending photo upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQueueItem {
    /// Internal id; lets the processor tell apart duplicate URIs
    #[serde(default = "new_entity_id")]
    pub id: String,
    /// Local file reference, the lookup key for status updates
    pub uri: String,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_time: Option<String>,
}

impl UploadQueueItem {
    pub fn new(uri: impl Into<String>, metadata: UploadMetadata) -> Self {
        Self {
            id: new_entity_id(),
            uri: uri.into(),
            status: UploadStatus::Pending,
            error: None,
            retry_count: 0,
            creation_time: metadata.creation_time,
            modification_time: metadata.modification_time,
        }
    }
}

/// Entry appended to the uploaded-photo log after a queued upload succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPhotoRecord {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_time: Option<String>,
    /// RFC 3339
    pub upload_time: String,
}

/// User-created album of photo ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    pub photo_ids: Vec<String>,
}
