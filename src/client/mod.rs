//! Remote photo server client
//!
//! Talks to the photo API:
//! - `POST /photos/list` for the server listing
//! - `POST /photos/upload` (multipart) for uploads
//! - `GET <photo url>` for full-resolution downloads

mod dto;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::ApiConfig;
use crate::data::ServerPhoto;
use crate::error::AppError;

pub use dto::{ListPhotosRequest, ListPhotosResponse, RemotePhoto, UploadResponse};

/// Seam between the upload queue and the network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    /// Upload the file at `path`
    ///
    /// Transport failures are `Err`; a server that answers with
    /// `success: false` yields `Ok` with that response.
    async fn upload(&self, path: &Path) -> Result<UploadResponse, AppError>;
}

/// HTTP client for the photo API
#[derive(Clone)]
pub struct PhotoApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl PhotoApiClient {
    /// Create new API client
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self::with_client(http, config))
    }

    /// Wrap an existing reqwest client
    pub fn with_client(http: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            http,
            config: config.clone(),
        }
    }

    /// Fetch the server photo listing
    ///
    /// # Arguments
    /// * `folder_id` - Optional folder to list
    ///
    /// # Errors
    /// `HttpClient` on transport/decoding failure, `Remote` when the
    /// server reports `success: false`
    pub async fn list_photos(&self, folder_id: Option<&str>) -> Result<Vec<ServerPhoto>, AppError> {
        use crate::metrics::REMOTE_REQUESTS_TOTAL;

        let url = self.config.endpoint("/photos/list");
        let result = self
            .http
            .post(&url)
            .json(&ListPhotosRequest { folder_id })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                REMOTE_REQUESTS_TOTAL.with_label_values(&["list", "error"]).inc();
                return Err(e.into());
            }
        };

        REMOTE_REQUESTS_TOTAL
            .with_label_values(&["list", response.status().as_str()])
            .inc();

        let body: ListPhotosResponse = response.json().await?;
        if !body.success {
            return Err(AppError::Remote(
                body.msg
                    .unwrap_or_else(|| "Server reported failure listing photos".to_string()),
            ));
        }

        let photos: Vec<ServerPhoto> = body.photos.into_iter().map(ServerPhoto::from).collect();
        tracing::info!(count = photos.len(), folder_id = ?folder_id, "Fetched server photos");
        Ok(photos)
    }

    /// Upload one photo as multipart field `file` (`photo.jpg`, `image/jpeg`)
    pub async fn upload_photo(&self, path: &Path) -> Result<UploadResponse, AppError> {
        use crate::metrics::REMOTE_REQUESTS_TOTAL;
        use reqwest::multipart::{Form, Part};

        let data = tokio::fs::read(path).await?;
        let size = data.len();

        let part = Part::bytes(data)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("file", part);

        let url = self.config.endpoint("/photos/upload");
        let response = match self.http.post(&url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                REMOTE_REQUESTS_TOTAL.with_label_values(&["upload", "error"]).inc();
                return Err(e.into());
            }
        };

        REMOTE_REQUESTS_TOTAL
            .with_label_values(&["upload", response.status().as_str()])
            .inc();

        let body: UploadResponse = response.json().await?;
        tracing::debug!(
            path = %path.display(),
            bytes = size,
            success = body.success,
            "Upload request finished"
        );
        Ok(body)
    }

    /// Download the full-resolution image into `dir/<filename>`
    ///
    /// # Returns
    /// The written path, or `None` when the server did not answer 200
    pub async fn download_photo(
        &self,
        photo: &ServerPhoto,
        dir: &Path,
    ) -> Result<Option<PathBuf>, AppError> {
        use crate::metrics::REMOTE_REQUESTS_TOTAL;

        let file_name = Path::new(&photo.filename)
            .file_name()
            .ok_or_else(|| {
                AppError::Validation(format!("Invalid photo filename: {:?}", photo.filename))
            })?
            .to_owned();

        let response = self.http.get(&photo.url).send().await?;
        let status = response.status();
        REMOTE_REQUESTS_TOTAL
            .with_label_values(&["download", status.as_str()])
            .inc();

        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = %photo.url, %status, "Download did not return 200");
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(file_name);
        tokio::fs::write(&target, &bytes).await?;

        tracing::info!(
            photo_id = %photo.id,
            path = %target.display(),
            bytes = bytes.len(),
            "Photo downloaded"
        );
        Ok(Some(target))
    }
}

#[async_trait]
impl PhotoUploader for PhotoApiClient {
    async fn upload(&self, path: &Path) -> Result<UploadResponse, AppError> {
        self.upload_photo(path).await
    }
}
