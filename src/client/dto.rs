//! Wire formats of the photo API

use serde::{Deserialize, Deserializer, Serialize};

use crate::data::ServerPhoto;

/// Body of `POST /photos/list`
#[derive(Debug, Serialize)]
pub struct ListPhotosRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<&'a str>,
}

/// Response of `POST /photos/list`
#[derive(Debug, Deserialize)]
pub struct ListPhotosResponse {
    pub success: bool,
    #[serde(default)]
    pub photos: Vec<RemotePhoto>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// One photo as the server describes it
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePhoto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub photo_url: String,
    pub thumbnail_url: String,
    pub filename: String,
    pub uploaded_at: String,
    #[serde(default)]
    pub capture_date: Option<String>,
}

impl From<RemotePhoto> for ServerPhoto {
    fn from(remote: RemotePhoto) -> Self {
        let capture_date = remote
            .capture_date
            .filter(|value| !value.is_empty())
            .or_else(|| Some(remote.uploaded_at.clone()));

        ServerPhoto {
            id: remote.id,
            url: remote.photo_url,
            thumbnail_url: remote.thumbnail_url,
            filename: remote.filename,
            uploaded_at: remote.uploaded_at,
            capture_date,
        }
    }
}

/// Response of `POST /photos/upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl UploadResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            msg: None,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: Some(msg.into()),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
