//! Bounded-concurrency download scheduler.
//!
//! All queue state lives in one mutex-guarded [`QueueState`]. Admission
//! (`pump`) runs entirely under that lock: it moves the oldest `Pending`
//! items to `Downloading` while the active count is below the limit and
//! spawns one worker task per admitted item. `pump` runs on start, after
//! every enqueue and after every worker finishes, so freed capacity is reused
//! without an external trigger.
//!
//! A worker owns exactly one item. It streams the artifact to disk, inspects
//! and hashes the file, reports to the catalog and moves the item to `Done`
//! or `Failed`. Item errors are logged and never reach the scheduler.

use crate::config::{IngestConfig, QueueConfig};
use crate::error::{IngestError, Result};
use crate::model_library::types::{FileFormat, Precision};
use crate::model_library::{
    compute_model_hashes, destination_path, detect_format, read_header, verify_sha256,
};
use crate::network::{download_to_path, remove_partial, ArtifactFetcher, HttpFetcher};
use crate::queue::catalog::{CatalogSink, LoggingCatalog, ModelFileRecord};
use crate::queue::store::QueueStore;
use crate::queue::types::{progress_fraction, DownloadStatus, QueueItem, QueueItemView};
use crate::registry::{ModelResolver, RegistryClient};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Buffered progress notifications per download; extra ones are dropped.
const PROGRESS_CHANNEL_CAPACITY: usize = 8;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

struct QueueState {
    /// Insertion order is admission order.
    items: Vec<QueueItem>,
    /// Items currently owned by a worker.
    active: usize,
    /// Cleared by `shutdown`; no new admissions afterwards.
    accepting: bool,
}

struct Inner {
    config: IngestConfig,
    store: QueueStore,
    resolver: Arc<dyn ModelResolver>,
    fetcher: Arc<dyn ArtifactFetcher>,
    catalog: Arc<dyn CatalogSink>,
    state: Mutex<QueueState>,
    /// Serializes snapshot writes so an older snapshot never lands last.
    save_lock: tokio::sync::Mutex<()>,
}

/// The download queue and its worker pool.
///
/// Cheap to clone; all clones share the same queue.
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DownloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("DownloadQueue")
            .field("items", &state.items.len())
            .field("active", &state.active)
            .field("limit", &self.inner.config.max_concurrent_downloads)
            .finish()
    }
}

impl DownloadQueue {
    /// Boot the queue against the configured registry, downloading over HTTP
    /// and reporting to the log.
    pub async fn start(config: IngestConfig) -> Result<Self> {
        let resolver = Arc::new(RegistryClient::new(&config)?);
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Self::start_with(config, resolver, fetcher, Arc::new(LoggingCatalog)).await
    }

    /// Boot the queue with explicit collaborators.
    ///
    /// Loads the snapshot (a corrupt one is fatal), resets items left
    /// `Downloading` by a previous process to `Pending`, and admits work.
    /// Must be called from within a Tokio runtime.
    pub async fn start_with(
        config: IngestConfig,
        resolver: Arc<dyn ModelResolver>,
        fetcher: Arc<dyn ArtifactFetcher>,
        catalog: Arc<dyn CatalogSink>,
    ) -> Result<Self> {
        config.validate()?;

        let store = QueueStore::new(config.snapshot_path());
        let mut items = store.load()?;

        let stale = reset_stale_downloads(&mut items);
        if !stale.is_empty() {
            warn!(
                "Resetting {} interrupted download(s) from {} to Pending",
                stale.len(),
                store.path().display()
            );
            for path in &stale {
                remove_partial(path).await;
            }
            store.save(&items)?;
        }

        let pending = items
            .iter()
            .filter(|i| i.status == DownloadStatus::Pending)
            .count();
        info!(
            "Download queue started with {} item(s), {} pending, limit {}",
            items.len(),
            pending,
            config.max_concurrent_downloads
        );

        let inner = Arc::new(Inner {
            config,
            store,
            resolver,
            fetcher,
            catalog,
            state: Mutex::new(QueueState {
                items,
                active: 0,
                accepting: true,
            }),
            save_lock: tokio::sync::Mutex::new(()),
        });

        pump(&inner);
        Ok(Self { inner })
    }

    /// Resolve `reference` and append one item per selected file.
    ///
    /// Resolution errors are returned as-is and leave the queue unchanged.
    /// A reference that resolves to nothing returns an empty list.
    pub async fn enqueue(&self, creator_id: &str, reference: &str) -> Result<Vec<QueueItem>> {
        let artifacts = self.inner.resolver.resolve(reference).await?;
        if artifacts.is_empty() {
            info!("Reference {:?} resolved to no files", reference);
            return Ok(Vec::new());
        }

        let models_dir = self.inner.config.models_dir();
        let mut created = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let id = Uuid::new_v4().to_string();
            let path = destination_path(&models_dir, &id, &artifact.file_name, artifact.category);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| IngestError::io_with_path(e, parent))?;
            }

            created.push(QueueItem {
                id,
                model_name: artifact.model_name,
                remote_id: artifact.remote_id,
                download_url: artifact.download_url,
                path,
                thumbnail: artifact.thumbnail.webp,
                thumbnail_hash: artifact.thumbnail.hash,
                status: DownloadStatus::Pending,
                progress: 0.0,
                size_mb: artifact.size_kb / 1024.0,
                creator_id: creator_id.to_string(),
                download_started: None,
                category: artifact.category,
                file_name: artifact.file_name,
                size_type: artifact.size_type,
                precision_hint: artifact.precision_hint,
                expected_sha256: artifact.expected_sha256,
            });
        }

        self.inner
            .state()
            .items
            .extend(created.iter().cloned());
        self.inner.persist_or_log().await;

        for item in &created {
            if let Err(e) = self.inner.catalog.queue_item_created(item).await {
                warn!("Catalog rejected new queue item {}: {}", item.id, e);
            }
        }

        pump(&self.inner);
        Ok(created)
    }

    /// Items in insertion order, optionally only those of one creator.
    pub fn list_queue(&self, creator_id: Option<&str>) -> Vec<QueueItemView> {
        self.inner
            .state()
            .items
            .iter()
            .filter(|item| creator_id.map_or(true, |c| item.creator_id == c))
            .map(QueueItemView::from)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.inner
            .state()
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Thumbnail bytes of an item; empty if it had no preview.
    pub fn get_thumbnail(&self, id: &str) -> Result<Vec<u8>> {
        self.inner
            .state()
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.thumbnail.clone())
            .ok_or_else(|| IngestError::QueueItemNotFound { id: id.to_string() })
    }

    /// Number of items currently owned by a worker.
    pub fn active_downloads(&self) -> usize {
        self.inner.state().active
    }

    /// Stop admitting work and write a final snapshot.
    ///
    /// In-flight downloads are not cancelled; they keep running and keep
    /// updating the snapshot until the process exits.
    pub async fn shutdown(&self) -> Result<()> {
        let active = {
            let mut state = self.inner.state();
            state.accepting = false;
            state.active
        };
        info!("Shutting down download queue with {} active download(s)", active);
        self.inner.persist().await
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn persist(&self) -> Result<()> {
        let _lock = self.save_lock.lock().await;
        let items = self.state().items.clone();
        self.store.save(&items)
    }

    async fn persist_or_log(&self) {
        if let Err(e) = self.persist().await {
            error!(
                "Failed to write queue snapshot {}: {}",
                self.store.path().display(),
                e
            );
        }
    }

    async fn notify_status(&self, view: &QueueItemView) {
        if let Err(e) = self.catalog.queue_status_changed(view).await {
            warn!("Catalog rejected status update for {}: {}", view.id, e);
        }
    }

    fn view_of(&self, id: &str) -> Option<QueueItemView> {
        self.state()
            .items
            .iter()
            .find(|item| item.id == id)
            .map(QueueItemView::from)
    }

    /// Raise the progress of a downloading item; never lowers it.
    fn record_progress(&self, id: &str, fraction: f64) {
        let mut state = self.state();
        if let Some(item) = state
            .items
            .iter_mut()
            .find(|item| item.id == id && item.status == DownloadStatus::Downloading)
        {
            if fraction > item.progress {
                item.progress = fraction;
            }
        }
    }

    /// Move a worker's item to its terminal status and release its slot.
    fn finish(&self, id: &str, status: DownloadStatus) -> Option<QueueItemView> {
        let mut state = self.state();
        state.active = state.active.saturating_sub(1);

        let item = state.items.iter_mut().find(|item| item.id == id)?;
        if !item.status.can_transition_to(status) {
            warn!(
                "Ignoring transition of {} from {} to {}",
                item.id, item.status, status
            );
            return Some(QueueItemView::from(&*item));
        }
        item.status = status;
        if status == DownloadStatus::Done {
            item.progress = 1.0;
        }
        Some(QueueItemView::from(&*item))
    }
}

/// Admit `Pending` items in FIFO order while capacity remains.
fn pump(inner: &Arc<Inner>) {
    let admitted = {
        let mut state = inner.state();
        let limit = inner.config.max_concurrent_downloads;
        let mut admitted = Vec::new();

        while state.accepting && state.active < limit {
            let Some(item) = state
                .items
                .iter_mut()
                .find(|item| item.status == DownloadStatus::Pending)
            else {
                break;
            };
            item.status = DownloadStatus::Downloading;
            item.progress = 0.0;
            item.download_started = Some(Utc::now());
            admitted.push(item.clone());
            state.active += 1;
        }
        admitted
    };

    for item in admitted {
        debug!("Admitted {} ({})", item.model_name, item.id);
        tokio::spawn(run_worker(Arc::clone(inner), item));
    }
}

async fn run_worker(inner: Arc<Inner>, item: QueueItem) {
    inner.persist_or_log().await;
    inner.notify_status(&item.view()).await;
    info!(
        "Downloading {} from {} to {}",
        item.model_name,
        item.download_url,
        item.path.display()
    );

    let status = match download_and_ingest(&inner, &item).await {
        Ok(record) => {
            if let Err(e) = inner.catalog.model_file_ingested(&record).await {
                warn!("Catalog rejected ingested file {}: {}", record.path.display(), e);
            }
            info!(
                "Finished {} ({}, model hash {})",
                item.model_name, record.precision, record.model_hash
            );
            DownloadStatus::Done
        }
        Err(e) => {
            error!(
                "Download of {} to {} failed: {}",
                item.download_url,
                item.path.display(),
                e
            );
            DownloadStatus::Failed
        }
    };

    let view = inner.finish(&item.id, status);
    inner.persist_or_log().await;
    if let Some(view) = view {
        inner.notify_status(&view).await;
    }

    pump(&inner);
}

async fn download_and_ingest(inner: &Arc<Inner>, item: &QueueItem) -> Result<ModelFileRecord> {
    let body = inner.fetcher.fetch(&item.download_url).await?;
    let total = item
        .expected_bytes()
        .or_else(|| body.content_length.filter(|len| *len > 0).map(|len| len as f64));

    let (tx, mut rx) = mpsc::channel::<QueueItemView>(PROGRESS_CHANNEL_CAPACITY);
    let catalog = Arc::clone(&inner.catalog);
    let reporter = tokio::spawn(async move {
        while let Some(view) = rx.recv().await {
            if let Err(e) = catalog.queue_status_changed(&view).await {
                warn!("Catalog rejected progress for {}: {}", view.id, e);
            }
        }
    });

    let mut last_report = Instant::now();
    let downloaded = download_to_path(body.stream, &item.path, |received| {
        inner.record_progress(&item.id, progress_fraction(received, total));
        if last_report.elapsed() >= QueueConfig::PROGRESS_REPORT_INTERVAL {
            if let Some(view) = inner.view_of(&item.id) {
                debug!("{}: {:.1}%", item.id, view.progress * 100.0);
                let _ = tx.try_send(view);
            }
            last_report = Instant::now();
        }
    })
    .await;

    drop(tx);
    if let Err(e) = reporter.await {
        warn!("Progress reporter for {} ended abnormally: {}", item.id, e);
    }

    let bytes = downloaded?;
    ingest_file(item, bytes).await
}

/// Classify and hash a completed download.
async fn ingest_file(item: &QueueItem, bytes: u64) -> Result<ModelFileRecord> {
    let path = item.path.clone();
    let (format, header_precision) = tokio::task::spawn_blocking(move || -> Result<_> {
        let format = detect_format(&path)?;
        let precision = match format {
            FileFormat::SafeTensors => Some(read_header(&path)?.primary_precision()),
            _ => None,
        };
        Ok((format, precision))
    })
    .await
    .map_err(|e| IngestError::Other(format!("Container inspection task failed: {}", e)))??;

    let precision = match header_precision {
        Some(p) if p.is_known() => p,
        Some(_) => item.precision_hint,
        None => Precision::Unknown,
    };

    let hashes = compute_model_hashes(&item.path).await?;
    if let Some(expected) = item.expected_sha256.as_deref() {
        verify_sha256(&hashes.sha256, expected)?;
    }

    Ok(ModelFileRecord {
        path: item.path.clone(),
        precision,
        size_mb: bytes as f64 / BYTES_PER_MB,
        sha1: hashes.sha1,
        sha256: hashes.sha256,
        blake3: hashes.blake3,
        model_hash: hashes.model_hash,
        item_id: item.id.clone(),
        uploader_id: item.creator_id.clone(),
        format,
        size_type: item.size_type,
        category: item.category,
    })
}

/// Return items left `Downloading` by a previous process to `Pending`.
///
/// Returns their destination paths so leftover partial files can be removed.
fn reset_stale_downloads(items: &mut [QueueItem]) -> Vec<PathBuf> {
    items
        .iter_mut()
        .filter(|item| item.status == DownloadStatus::Downloading)
        .map(|item| {
            item.status = DownloadStatus::Pending;
            item.progress = 0.0;
            item.download_started = None;
            item.path.clone()
        })
        .collect()
}
