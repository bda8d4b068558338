//! Centralized configuration for the ingestion pipeline.
//!
//! Static tunables live as associated constants on unit structs. Runtime
//! settings (data directory, registry endpoint, concurrency) live in
//! [`IngestConfig`], which can be read from the environment.

use crate::error::{IngestError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Download queue configuration.
pub struct QueueConfig;

impl QueueConfig {
    pub const SNAPSHOT_FILE_NAME: &'static str = "download-queue.json";
    pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;
    /// Minimum gap between progress notifications sent to the catalog.
    pub const PROGRESS_REPORT_INTERVAL: Duration = Duration::from_millis(500);
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const DEFAULT_REGISTRY_BASE: &'static str = "https://civitai.com/api/v1";
    pub const USER_AGENT: &'static str = "spark-ingest/0.1";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
}

/// Hashing and container parsing limits.
pub struct HashConfig;

impl HashConfig {
    /// Read buffer for streaming hashes (8MB, optimal for SSDs).
    pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;
    pub const SHA1_HEX_LEN: usize = 40;
    pub const SHA256_HEX_LEN: usize = 64;
    pub const BLAKE3_HEX_LEN: usize = 64;
    pub const MODEL_HASH_HEX_LEN: usize = 16;
    /// Largest container header accepted by the parser.
    pub const MAX_HEADER_BYTES: u64 = 100_000_000;
}

/// Preview thumbnail settings.
pub struct ThumbnailConfig;

impl ThumbnailConfig {
    pub const EDGE_PX: u32 = 256;
    pub const HASH_COMPONENTS_X: u32 = 4;
    pub const HASH_COMPONENTS_Y: u32 = 4;
}

/// Directory names under the data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const MODELS_DIR_NAME: &'static str = "models";
}

/// Environment variable names read by [`IngestConfig::from_env`].
pub mod env {
    pub const DATA_DIR: &str = "SPARKUI_CORE_DATA_DIR";
    pub const REGISTRY_BASE: &str = "SPARKUI_CORE_CIVITAI_BASE";
    pub const REGISTRY_KEY: &str = "SPARKUI_CORE_CIVITAI_KEY";
    pub const MAX_CONCURRENT_DOWNLOADS: &str = "SPARKUI_CORE_MAX_CONCURRENT_DOWNLOADS";
}

/// Runtime configuration for the download queue.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root under which the queue snapshot and the models tree live.
    pub data_dir: PathBuf,
    /// Versioned registry API root, e.g. `https://civitai.com/api/v1`.
    pub registry_base_url: String,
    /// Optional bearer token for the registry.
    pub registry_api_key: Option<String>,
    /// Process-wide cap on concurrently downloading items.
    pub max_concurrent_downloads: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            registry_base_url: NetworkConfig::DEFAULT_REGISTRY_BASE.to_string(),
            registry_api_key: None,
            max_concurrent_downloads: QueueConfig::DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

impl IngestConfig {
    /// Create a configuration rooted at `data_dir` with default settings.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read configuration from `SPARKUI_CORE_*` environment variables.
    ///
    /// Unset variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup(env::DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(base) = lookup(env::REGISTRY_BASE) {
            config.registry_base_url = base;
        }
        config.registry_api_key = lookup(env::REGISTRY_KEY).filter(|k| !k.trim().is_empty());
        if let Some(raw) = lookup(env::MAX_CONCURRENT_DOWNLOADS) {
            let limit = raw.trim().parse::<usize>().map_err(|e| IngestError::Config {
                message: format!("{} must be a positive integer: {}", env::MAX_CONCURRENT_DOWNLOADS, e),
            })?;
            config.max_concurrent_downloads = limit;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_registry_base_url(mut self, url: impl Into<String>) -> Self {
        self.registry_base_url = url.into();
        self
    }

    pub fn with_registry_api_key(mut self, key: impl Into<String>) -> Self {
        self.registry_api_key = Some(key.into());
        self
    }

    pub fn with_max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = limit;
        self
    }

    /// Check invariants the scheduler relies on.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(IngestError::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
            });
        }
        if url::Url::parse(&self.registry_base_url).is_err() {
            return Err(IngestError::Config {
                message: format!("Invalid registry base URL: {}", self.registry_base_url),
            });
        }
        Ok(())
    }

    /// Path of the queue snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(QueueConfig::SNAPSHOT_FILE_NAME)
    }

    /// Root of the categorized models tree.
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::MODELS_DIR_NAME)
    }
}
