//! Download queue: item model, durable snapshot, catalog reporting and the
//! bounded worker pool.

mod catalog;
mod scheduler;
mod store;
mod types;

pub use catalog::{CatalogSink, LoggingCatalog, ModelFileRecord};
pub use scheduler::DownloadQueue;
pub use store::QueueStore;
pub use types::{progress_fraction, DownloadStatus, QueueItem, QueueItemView};
