//! File-backed queue snapshot.
//!
//! Writes are atomic:
//! 1. Serialize to a temp file with a unique PID+TID suffix
//! 2. Flush and sync so the data reaches disk
//! 3. Rename over the snapshot path
//!
//! A crash at any point leaves either the previous snapshot or the new one.

use crate::error::{IngestError, Result};
use crate::queue::types::QueueItem;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use tracing::debug;

/// Durable snapshot of the download queue at `<data_dir>/download-queue.json`.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot.
    ///
    /// A missing file yields an empty queue and an empty snapshot is created.
    /// A file that does not parse yields `CorruptSnapshot`; it is left in place
    /// for the operator.
    pub fn load(&self) -> Result<Vec<QueueItem>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No queue snapshot at {}, starting empty", self.path.display());
                self.save(&[])?;
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(IngestError::Io {
                    message: format!("Failed to read {}", self.path.display()),
                    path: Some(self.path.clone()),
                    source: Some(e),
                })
            }
        };

        let items: Vec<QueueItem> =
            serde_json::from_str(&contents).map_err(|e| IngestError::CorruptSnapshot {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        debug!("Loaded {} queue items from {}", items.len(), self.path.display());
        Ok(items)
    }

    /// Replace the snapshot with `items`, in order.
    pub fn save(&self, items: &[QueueItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| IngestError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let serialized = serde_json::to_string_pretty(items)?;

        let temp_path = self
            .path
            .with_extension(format!("json.{}.{}.tmp", process::id(), thread_id()));

        let write_result = (|| {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.flush()?;
            file.sync_all()
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(IngestError::Io {
                message: format!("Failed to write temp file {}", temp_path.display()),
                path: Some(temp_path),
                source: Some(e),
            });
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            IngestError::Io {
                message: format!(
                    "Failed to rename {} to {}",
                    temp_path.display(),
                    self.path.display()
                ),
                path: Some(self.path.clone()),
                source: Some(e),
            }
        })?;

        debug!("Wrote {} queue items to {}", items.len(), self.path.display());
        Ok(())
    }
}

/// Get a unique thread identifier.
fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    format!("{:?}", thread::current().id()).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::types::tests::sample_item;
    use crate::queue::types::DownloadStatus;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> QueueStore {
        QueueStore::new(tmp.path().join("download-queue.json"))
    }

    #[test]
    fn test_load_missing_creates_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        assert!(store.load().unwrap().is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[]");
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut done = sample_item("b", "u2");
        done.status = DownloadStatus::Done;
        done.progress = 1.0;
        let items = vec![sample_item("a", "u1"), done];

        store.save(&items).unwrap();
        assert_eq!(store.load().unwrap(), items);
    }

    #[test]
    fn test_save_of_load_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut started = sample_item("c", "u1");
        started.status = DownloadStatus::Failed;
        started.progress = 0.4375;
        started.download_started = Some(chrono::Utc::now());
        store
            .save(&[sample_item("a", "u1"), sample_item("b", "u2"), started])
            .unwrap();

        let first = fs::read(store.path()).unwrap();
        let loaded = store.load().unwrap();
        store.save(&loaded).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first);
    }

    #[test]
    fn test_save_of_load_keeps_arbitrary_fractions() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let items: Vec<QueueItem> = (0..2000u64)
            .map(|n| {
                let mut item = sample_item(&format!("i{}", n), "u");
                item.size_mb = (n as f64 * 7919.0 + 13.0) / 1024.0;
                item.status = DownloadStatus::Downloading;
                item.progress = (n * 4096 + 17) as f64 / (item.size_mb * 1_048_576.0);
                item
            })
            .collect();
        store.save(&items).unwrap();

        let first = fs::read(store.path()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, items);
        store.save(&loaded).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first);
    }

    #[test]
    fn test_corrupt_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, IngestError::CorruptSnapshot { .. }));
        assert!(err.is_fatal_at_boot());
        // The broken file is kept for inspection
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = QueueStore::new(tmp.path().join("nested").join("download-queue.json"));
        store.save(&[sample_item("a", "u")]).unwrap();

        let names: Vec<String> = fs::read_dir(tmp.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["download-queue.json".to_string()]);
    }
}
