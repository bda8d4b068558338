//! Spark Ingest - model download queue and ingestion pipeline.
//!
//! This crate accepts remote model references, resolves them against a model
//! registry, downloads the artifacts with bounded concurrency, and ingests
//! each file: container header inspection, multi-algorithm hashing and a
//! catalog record. Queue state survives restarts through a JSON snapshot.
//!
//! # Example
//!
//! ```rust,ignore
//! use spark_ingest::{DownloadQueue, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> spark_ingest::Result<()> {
//!     let queue = DownloadQueue::start(IngestConfig::from_env()?).await?;
//!
//!     let items = queue
//!         .enqueue("user-1", "https://civitai.com/models/4201?modelVersionId=130072")
//!         .await?;
//!     println!("Queued {} file(s)", items.len());
//!
//!     for item in queue.list_queue(Some("user-1")) {
//!         println!("{} {} {:.0}%", item.model_name, item.status, item.progress * 100.0);
//!     }
//!
//!     queue.shutdown().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod model_library;
pub mod network;
pub mod queue;
pub mod registry;

// Re-export commonly used types
pub use config::IngestConfig;
pub use error::{IngestError, LookupStage, Result};
pub use model_library::{
    compute_model_hashes, detect_format, read_header, ContainerHeader, FileFormat, ModelCategory,
    ModelHashes, Precision, SizeType,
};
pub use network::{ArtifactFetcher, HttpFetcher};
pub use queue::{
    CatalogSink, DownloadQueue, DownloadStatus, LoggingCatalog, ModelFileRecord, QueueItem,
    QueueItemView, QueueStore,
};
pub use registry::{
    make_thumbnail, parse_reference, ModelReference, ModelResolver, RegistryClient,
    ResolvedArtifact, Thumbnail,
};
