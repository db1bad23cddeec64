//! Error types for PhotoSync
//!
//! All fallible operations in the crate return `AppError`.
//! Callers at the UI boundary decide whether to degrade to a
//! default value or surface the failure.

use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found
    #[error("Resource not found")]
    NotFound,

    /// Validation error (bad input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP transport error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Remote server answered but reported failure
    #[error("Remote error: {0}")]
    Remote(String),

    /// Upload of a local photo failed
    #[error("{0}")]
    Upload(String),

    /// Local file storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Access to device media was denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Remote(_) => "remote",
            AppError::Upload(_) => "upload",
            AppError::Storage(_) => "storage",
            AppError::Serialization(_) => "serialization",
            AppError::Io(_) => "io",
            AppError::PermissionDenied(_) => "permission",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
