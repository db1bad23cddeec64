//! Persisted key/value blobs
//!
//! Every persisted structure (listing cache, upload queue, registry,
//! albums) is one JSON blob under a string key in SQLite. Writers
//! serialize on a single async mutex so a read-modify-write cycle
//! can never interleave with another writer.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

use crate::error::AppError;

/// Storage key of the server listing cache
pub const SERVER_PHOTOS_CACHE_KEY: &str = "server_photos_cache";
/// Storage key of the upload queue
pub const UPLOAD_QUEUE_KEY: &str = "PHOTO_UPLOAD_QUEUE";
/// Storage key of the uploaded photo id registry
pub const UPLOADED_PHOTOS_KEY: &str = "uploaded_photos";
/// Storage key of the uploaded photo metadata log
pub const PHOTOS_KEY: &str = "PHOTOS";
/// Storage key of user albums
pub const ALBUMS_KEY: &str = "albums";

/// SQLite-backed blob store
pub struct Store {
    pool: Pool<Sqlite>,
    write_lock: Mutex<()>,
}

impl Store {
    /// Open (or create) the store at `path` and run migrations
    ///
    /// # Errors
    /// Returns error if the file cannot be created or migrations fail
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory store; contents vanish when dropped
    pub async fn in_memory() -> Result<Self, AppError> {
        // every pooled connection would otherwise get its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, AppError> {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::debug!("Store ready");

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    async fn read_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn write_raw(&self, key: &str, value: String) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, %error, "Discarding malformed persisted blob");
                None
            }
        }
    }

    /// Read and decode the blob at `key`
    ///
    /// A blob that fails to decode is logged and reported as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let raw = self.read_raw(key).await?;
        Ok(raw.and_then(|raw| Self::decode(key, &raw)))
    }

    /// Overwrite the blob at `key`
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let encoded = serde_json::to_string(value)?;
        let _guard = self.write_lock.lock().await;
        self.write_raw(key, encoded).await
    }

    /// Delete the blob at `key`; missing keys are fine
    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomic read-modify-write of the blob at `key`
    ///
    /// Missing or malformed blobs start from `T::default()`. The closure's
    /// return value is passed back to the caller. The blob is written
    /// back even when the closure changed nothing.
    pub async fn update<T, R, F>(&self, key: &str, mutate: F) -> Result<R, AppError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.write_lock.lock().await;

        let mut value: T = self
            .read_raw(key)
            .await?
            .and_then(|raw| Self::decode(key, &raw))
            .unwrap_or_default();

        let result = mutate(&mut value);

        let encoded = serde_json::to_string(&value)?;
        self.write_raw(key, encoded).await?;

        Ok(result)
    }
}
