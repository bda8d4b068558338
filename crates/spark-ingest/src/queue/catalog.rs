//! Outbound notifications to the model catalog.

use crate::error::Result;
use crate::model_library::types::{FileFormat, ModelCategory, Precision, SizeType};
use crate::queue::types::{QueueItem, QueueItemView};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Permanent record of an ingested model file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFileRecord {
    pub path: PathBuf,
    pub precision: Precision,
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
    pub sha1: String,
    pub sha256: String,
    pub blake3: String,
    pub model_hash: String,
    pub item_id: String,
    pub uploader_id: String,
    pub format: FileFormat,
    pub size_type: SizeType,
    pub category: ModelCategory,
}

/// The catalog the queue reports to.
///
/// Errors are logged by the queue and never change an item's status.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// A new item was appended to the queue.
    async fn queue_item_created(&self, item: &QueueItem) -> Result<()>;

    /// Status or progress of an item changed.
    async fn queue_status_changed(&self, item: &QueueItemView) -> Result<()>;

    /// A downloaded file finished hashing and classification.
    async fn model_file_ingested(&self, record: &ModelFileRecord) -> Result<()>;
}

/// Catalog that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCatalog;

#[async_trait]
impl CatalogSink for LoggingCatalog {
    async fn queue_item_created(&self, item: &QueueItem) -> Result<()> {
        info!(
            "Queued {} ({}) for {} at {}",
            item.model_name,
            item.id,
            item.creator_id,
            item.path.display()
        );
        Ok(())
    }

    async fn queue_status_changed(&self, item: &QueueItemView) -> Result<()> {
        debug!(
            "Queue item {} is {} ({:.1}%)",
            item.id,
            item.status,
            item.progress * 100.0
        );
        Ok(())
    }

    async fn model_file_ingested(&self, record: &ModelFileRecord) -> Result<()> {
        info!(
            "Ingested {} ({:?}, {}, {:.1} MB, model hash {})",
            record.path.display(),
            record.format,
            record.precision,
            record.size_mb,
            record.model_hash
        );
        Ok(())
    }
}
