//! Streaming hash computation for downloaded model files.
//!
//! Computes four digests per file:
//! - SHA256, SHA1 and BLAKE3 over the whole file
//! - the model hash: SHA256 over the bytes following the length-prefixed
//!   header region, truncated to 16 hex chars
//!
//! Each digest runs on its own blocking task with its own file handle, so the
//! passes proceed concurrently instead of sharing a cursor.

use crate::config::HashConfig;
use crate::error::{IngestError, Result};
use blake3::Hasher as Blake3Hasher;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// All digests computed for an ingested file, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHashes {
    pub sha256: String,
    pub sha1: String,
    pub blake3: String,
    pub model_hash: String,
}

/// Compute all four digests concurrently.
///
/// Any read error aborts the whole operation; partial digests are discarded.
pub async fn compute_model_hashes(path: impl AsRef<Path>) -> Result<ModelHashes> {
    let path = path.as_ref().to_path_buf();
    debug!("Calculating hashes for {}", path.display());
    let start = Instant::now();

    let (sha256, sha1, blake3, model_hash) = tokio::try_join!(
        on_blocking_pool(path.clone(), compute_sha256),
        on_blocking_pool(path.clone(), compute_sha1),
        on_blocking_pool(path.clone(), compute_blake3),
        on_blocking_pool(path.clone(), compute_model_hash),
    )?;

    debug!(
        "Hashes for {} calculated in {:?}",
        path.display(),
        start.elapsed()
    );

    Ok(ModelHashes {
        sha256,
        sha1,
        blake3,
        model_hash,
    })
}

async fn on_blocking_pool(
    path: PathBuf,
    hash_fn: fn(&Path) -> Result<String>,
) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_fn(&path))
        .await
        .map_err(|e| IngestError::Other(format!("Hash computation task failed: {}", e)))?
}

/// SHA256 of the whole file.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    stream_file(path, 0, |chunk| hasher.update(chunk))?;
    Ok(truncate_hex(
        hex::encode(hasher.finalize()),
        HashConfig::SHA256_HEX_LEN,
    ))
}

/// SHA1 of the whole file.
pub fn compute_sha1(path: &Path) -> Result<String> {
    let mut hasher = Sha1::new();
    stream_file(path, 0, |chunk| hasher.update(chunk))?;
    Ok(truncate_hex(
        hex::encode(hasher.finalize()),
        HashConfig::SHA1_HEX_LEN,
    ))
}

/// BLAKE3 of the whole file.
pub fn compute_blake3(path: &Path) -> Result<String> {
    let mut hasher = Blake3Hasher::new();
    stream_file(path, 0, |chunk| {
        hasher.update(chunk);
    })?;
    Ok(truncate_hex(
        hasher.finalize().to_hex().to_string(),
        HashConfig::BLAKE3_HEX_LEN,
    ))
}

/// Model hash: SHA256 of the bytes after `8 + N`, where `N` is the u64 LE in
/// the first 8 bytes.
///
/// Works on any file. Missing prefix bytes count as zero, and a skip past the
/// end of the file hashes the empty input.
pub fn compute_model_hash(path: &Path) -> Result<String> {
    let skip = {
        let mut file =
            std::fs::File::open(path).map_err(|e| IngestError::io_with_path(e, path))?;
        let mut len_buf = [0u8; 8];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = file
                .read(&mut len_buf[filled..])
                .map_err(|e| IngestError::io_with_path(e, path))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        u64::from_le_bytes(len_buf)
    };

    let mut hasher = Sha256::new();
    stream_file(path, 8u64.saturating_add(skip), |chunk| hasher.update(chunk))?;
    Ok(truncate_hex(
        hex::encode(hasher.finalize()),
        HashConfig::MODEL_HASH_HEX_LEN,
    ))
}

/// Compare a computed SHA256 with a registry-declared one.
pub fn verify_sha256(actual: &str, expected: &str) -> Result<()> {
    let expected_lower = expected.trim().to_lowercase();
    if actual.eq_ignore_ascii_case(&expected_lower) {
        Ok(())
    } else {
        Err(IngestError::HashMismatch {
            expected: expected_lower,
            actual: actual.to_string(),
        })
    }
}

/// Feed the file from `offset` to EOF through `update`, chunk by chunk.
fn stream_file(path: &Path, offset: u64, mut update: impl FnMut(&[u8])) -> Result<u64> {
    let mut file = std::fs::File::open(path).map_err(|e| IngestError::io_with_path(e, path))?;
    let file_len = file
        .metadata()
        .map_err(|e| IngestError::io_with_path(e, path))?
        .len();
    if offset >= file_len {
        return Ok(0);
    }
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| IngestError::io_with_path(e, path))?;
    }

    let mut buffer = vec![0u8; HashConfig::CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| IngestError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }
    Ok(total)
}

fn truncate_hex(mut hex: String, len: usize) -> String {
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    #[tokio::test]
    async fn test_hashes_of_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let hashes = compute_model_hashes(file.path()).await.unwrap();

        assert_eq!(
            hashes.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hashes.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(
            hashes.blake3,
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
        // Nothing after the prefix: digest of empty input
        assert_eq!(hashes.model_hash, "e3b0c44298fc1c14");
    }

    #[tokio::test]
    async fn test_digest_lengths() {
        let file = temp_with(b"Hello, World!");
        let hashes = compute_model_hashes(file.path()).await.unwrap();
        assert_eq!(hashes.sha256.len(), 64);
        assert_eq!(hashes.sha1.len(), 40);
        assert_eq!(hashes.blake3.len(), 64);
        assert_eq!(hashes.model_hash.len(), 16);
        assert_eq!(hashes.sha256, sha256_hex(b"Hello, World!"));
    }

    #[test]
    fn test_model_hash_covers_only_bytes_after_prefix() {
        let header = br#"{"a":{"dtype":"F16"}}"#;
        let payload = b"tensor-bytes-go-here";

        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header);
        bytes.extend_from_slice(payload);
        let file = temp_with(&bytes);

        let expected = &sha256_hex(payload)[..16];
        assert_eq!(compute_model_hash(file.path()).unwrap(), expected);
    }

    #[test]
    fn test_model_hash_ignores_prefix_content() {
        let payload = b"same payload";
        let make = |header: &[u8]| {
            let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
            bytes.extend_from_slice(header);
            bytes.extend_from_slice(payload);
            temp_with(&bytes)
        };

        let a = make(br#"{"x":{"dtype":"F16"}}"#);
        let b = make(br#"{"y":{"dtype":"F32"}}"#);
        assert_eq!(
            compute_model_hash(a.path()).unwrap(),
            compute_model_hash(b.path()).unwrap()
        );
        assert_ne!(
            compute_sha256(a.path()).unwrap(),
            compute_sha256(b.path()).unwrap()
        );
    }

    #[test]
    fn test_model_hash_skip_past_eof() {
        let mut bytes = 1_000_000u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        let file = temp_with(&bytes);
        assert_eq!(compute_model_hash(file.path()).unwrap(), "e3b0c44298fc1c14");

        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        let file = temp_with(&bytes);
        assert_eq!(compute_model_hash(file.path()).unwrap(), "e3b0c44298fc1c14");
    }

    #[test]
    fn test_model_hash_of_tiny_file() {
        // Fewer than 8 bytes: the length reads as 3 and nothing follows offset 11
        let file = temp_with(&[3, 0, 0]);
        assert_eq!(compute_model_hash(file.path()).unwrap(), "e3b0c44298fc1c14");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = compute_model_hashes("/nonexistent/spark/model.safetensors").await;
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }

    #[test]
    fn test_verify_sha256() {
        let actual = sha256_hex(b"abc");
        assert!(verify_sha256(&actual, &actual.to_uppercase()).is_ok());
        assert!(matches!(
            verify_sha256(&actual, "deadbeef"),
            Err(IngestError::HashMismatch { .. })
        ));
    }
}
