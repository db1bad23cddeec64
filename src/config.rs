//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

/// Remote photo server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the photo API (e.g., "https://photos.example.com/api")
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl ApiConfig {
    /// Build a full endpoint URL from a path like "/photos/list"
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite file holding persisted blobs
    pub database_path: PathBuf,
    /// Directory where downloaded server photos are written
    pub download_dir: PathBuf,
}

/// Listing cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched server listing stays valid (default: 172800 = 2 days)
    pub listing_ttl_seconds: u64,
    /// Number of photo ids tracked by the visible window (default: 20)
    pub visible_window_size: usize,
}

impl CacheConfig {
    pub fn listing_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.listing_ttl_seconds as i64)
    }
}

/// Upload queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Attempts per item before it is skipped for good (default: 3)
    pub max_retries: u32,
    /// Interval between sweeps when running `watch` (default: 60)
    pub sweep_interval_seconds: u64,
}

/// Gallery monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Minimum gap between two "new photos" notifications (default: 2000)
    pub notification_throttle_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// Filter directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("photosync={}", self.level.trim().to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (PHOTOSYNC__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("api.base_url", "http://127.0.0.1:8000")?
            .set_default("api.timeout_seconds", 30)?
            .set_default("api.user_agent", "PhotoSync/0.1.0")?
            .set_default("storage.database_path", "data/photosync.db")?
            .set_default("storage.download_dir", "data/downloads")?
            .set_default("cache.listing_ttl_seconds", 172_800)?
            .set_default("cache.visible_window_size", 20)?
            .set_default("queue.max_retries", 3)?
            .set_default("queue.sweep_interval_seconds", 60)?
            .set_default("monitor.notification_throttle_ms", 2000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("PHOTOSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(AppError::Config("api.base_url must not be empty".to_string()));
        }

        match url::Url::parse(base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(AppError::Config(format!(
                    "api.base_url must use http or https, got {}",
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(AppError::Config(format!("api.base_url is invalid: {}", e)));
            }
        }

        if self.queue.max_retries == 0 {
            return Err(AppError::Config(
                "queue.max_retries must be greater than 0".to_string(),
            ));
        }

        if self.cache.visible_window_size == 0 {
            return Err(AppError::Config(
                "cache.visible_window_size must be greater than 0".to_string(),
            ));
        }

        if self.cache.listing_ttl_seconds == 0 {
            return Err(AppError::Config(
                "cache.listing_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        let level = self.logging.level.trim().to_ascii_lowercase();
        if !LoggingConfig::LEVELS.contains(&level.as_str()) {
            return Err(AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error, got {}",
                self.logging.level
            )));
        }

        let format = self.logging.format.trim();
        if !format.eq_ignore_ascii_case("json") && !format.eq_ignore_ascii_case("pretty") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {}",
                self.logging.format
            )));
        }

        if self.queue.sweep_interval_seconds == 0 {
            tracing::warn!("queue.sweep_interval_seconds=0 is invalid; watch will clamp to 1 second");
        }

        Ok(())
    }
}
