//! Streaming a fetched body to disk.
//!
//! Bytes go to `<dest>.part` first; the temp file is renamed over `dest`
//! only after the stream ends cleanly and the data is flushed. Any error
//! removes the temp file and leaves `dest` untouched.

use crate::config::NetworkConfig;
use crate::error::{IngestError, Result};
use crate::model_library::partial_path;
use crate::network::fetcher::ByteStream;
use futures::StreamExt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Write `stream` to `dest`, calling `on_progress` with the running byte
/// count after every chunk. Returns the number of bytes written.
pub async fn download_to_path(
    mut stream: ByteStream,
    dest: &Path,
    mut on_progress: impl FnMut(u64),
) -> Result<u64> {
    let temp_path = partial_path(dest, NetworkConfig::DOWNLOAD_TEMP_SUFFIX);

    let result = async {
        let mut file = fs::File::create(&temp_path).await.map_err(|e| IngestError::Io {
            message: format!("Failed to create temp file: {}", e),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;

        let mut bytes_downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| IngestError::Io {
                message: format!("Failed to write to temp file: {}", e),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;
            bytes_downloaded += chunk.len() as u64;
            on_progress(bytes_downloaded);
        }

        file.flush().await.map_err(|e| IngestError::Io {
            message: format!("Failed to flush temp file: {}", e),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;
        file.sync_all().await.map_err(|e| IngestError::Io {
            message: format!("Failed to sync temp file: {}", e),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;
        drop(file);

        fs::rename(&temp_path, dest).await.map_err(|e| IngestError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                dest.display()
            ),
            path: Some(dest.to_path_buf()),
            source: Some(e),
        })?;

        Ok::<u64, IngestError>(bytes_downloaded)
    }
    .await;

    match result {
        Ok(bytes) => {
            debug!("Downloaded {} bytes to {}", bytes, dest.display());
            Ok(bytes)
        }
        Err(e) => {
            remove_partial(dest).await;
            Err(e)
        }
    }
}

/// Remove a leftover `<dest>.part`, if any.
pub async fn remove_partial(dest: &Path) {
    let temp_path = partial_path(dest, NetworkConfig::DOWNLOAD_TEMP_SUFFIX);
    match fs::remove_file(&temp_path).await {
        Ok(()) => debug!("Removed partial file {}", temp_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", temp_path.display(), e),
    }
}
