//! Tensor container header parsing and file format detection.
//!
//! Container layout:
//! - 0-7: header length `N` (u64, little-endian)
//! - 8..8+N: JSON header mapping tensor name to `{dtype, shape, data_offsets}`,
//!   plus an optional `__metadata__` string map
//! - 8+N..: raw tensor data

use crate::config::HashConfig;
use crate::error::{IngestError, Result};
use crate::model_library::types::{FileFormat, Precision};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Reserved header key holding free-form string metadata.
const METADATA_KEY: &str = "__metadata__";

/// Magic bytes for format detection.
mod magic {
    /// ZIP header (PyTorch .pt/.ckpt archives)
    pub const ZIP: &[u8; 4] = &[0x50, 0x4B, 0x03, 0x04];
    /// Pickle protocol marker
    pub const PICKLE: u8 = 0x80;
    pub const PICKLE_PROTO_MIN: u8 = 2;
    pub const PICKLE_PROTO_MAX: u8 = 5;
}

/// Metadata for one tensor entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TensorInfo {
    /// Element type token as written in the header; empty if absent.
    pub dtype: String,
    pub shape: Vec<u64>,
    pub data_offsets: Option<(u64, u64)>,
}

/// Parsed container header.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    header_len: u64,
    raw: Vec<u8>,
    /// Tensor entries keyed by name.
    pub tensors: BTreeMap<String, TensorInfo>,
    /// Contents of `__metadata__`, non-string values dropped.
    pub metadata: BTreeMap<String, String>,
}

impl ContainerHeader {
    /// Parse header bytes that have already been read from a container.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| IngestError::MalformedContainer {
                path: None,
                message: format!("header is not valid JSON: {}", e),
            })?;

        let serde_json::Value::Object(entries) = value else {
            return Err(IngestError::MalformedContainer {
                path: None,
                message: "header is not a JSON object".to_string(),
            });
        };

        let mut tensors = BTreeMap::new();
        let mut metadata = BTreeMap::new();

        for (name, entry) in entries {
            if name == METADATA_KEY {
                if let serde_json::Value::Object(fields) = entry {
                    for (key, value) in fields {
                        if let serde_json::Value::String(s) = value {
                            metadata.insert(key, s);
                        }
                    }
                }
                continue;
            }
            tensors.insert(name, tensor_info(&entry));
        }

        Ok(Self {
            header_len: raw.len() as u64,
            raw,
            tensors,
            metadata,
        })
    }

    /// Declared header length `N`.
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Exact header bytes as stored in the file.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Offset of the first tensor data byte.
    pub fn data_start(&self) -> u64 {
        8 + self.header_len
    }

    /// Precision of the first tensor entry with a non-empty dtype.
    ///
    /// Entries are visited in key order. Returns `Unknown` when no entry has a
    /// dtype or the first dtype is not a recognized token.
    pub fn primary_precision(&self) -> Precision {
        self.tensors
            .values()
            .map(|t| t.dtype.trim())
            .find(|dtype| !dtype.is_empty())
            .map(Precision::from_dtype)
            .unwrap_or(Precision::Unknown)
    }
}

/// Lenient extraction: entries that are not objects or lack fields still parse.
fn tensor_info(entry: &serde_json::Value) -> TensorInfo {
    let dtype = entry
        .get("dtype")
        .and_then(|d| d.as_str())
        .unwrap_or_default()
        .to_string();
    let shape = entry
        .get("shape")
        .and_then(|s| s.as_array())
        .map(|dims| dims.iter().filter_map(|d| d.as_u64()).collect())
        .unwrap_or_default();
    let data_offsets = entry
        .get("data_offsets")
        .and_then(|o| o.as_array())
        .and_then(|o| match o.as_slice() {
            [begin, end] => Some((begin.as_u64()?, end.as_u64()?)),
            _ => None,
        });

    TensorInfo {
        dtype,
        shape,
        data_offsets,
    }
}

/// Read and parse the header of a container file.
///
/// Fails with `MalformedContainer` if the file is shorter than `8 + N` bytes,
/// if `N` exceeds the header size limit, or if the header is not a JSON object.
pub fn read_header(path: impl AsRef<Path>) -> Result<ContainerHeader> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| IngestError::io_with_path(e, path))?;
    let file_len = file
        .metadata()
        .map_err(|e| IngestError::io_with_path(e, path))?
        .len();

    if file_len < 8 {
        return Err(IngestError::malformed(
            path,
            format!("file is {} bytes, too short for a header length", file_len),
        ));
    }

    let mut len_buf = [0u8; 8];
    file.read_exact(&mut len_buf)
        .map_err(|e| IngestError::io_with_path(e, path))?;
    let header_len = u64::from_le_bytes(len_buf);

    if header_len > HashConfig::MAX_HEADER_BYTES {
        return Err(IngestError::malformed(
            path,
            format!("declared header length {} exceeds limit", header_len),
        ));
    }
    if file_len - 8 < header_len {
        return Err(IngestError::malformed(
            path,
            format!(
                "declared header length {} but only {} bytes follow",
                header_len,
                file_len - 8
            ),
        ));
    }

    let mut raw = vec![0u8; header_len as usize];
    file.read_exact(&mut raw)
        .map_err(|e| IngestError::io_with_path(e, path))?;

    ContainerHeader::from_bytes(raw).map_err(|e| match e {
        IngestError::MalformedContainer { message, .. } => IngestError::malformed(path, message),
        other => other,
    })
}

/// Detect the on-disk format from magic bytes, falling back to the extension.
pub fn detect_format(path: impl AsRef<Path>) -> Result<FileFormat> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| IngestError::io_with_path(e, path))?;

    let mut header = [0u8; 16];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .map_err(|e| IngestError::io_with_path(e, path))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    Ok(format_from_magic(&header[..filled], &extension))
}

fn format_from_magic(header: &[u8], extension: &str) -> FileFormat {
    if header.len() >= 4 && &header[..4] == magic::ZIP {
        return FileFormat::PickleTensor;
    }

    if header.len() >= 2
        && header[0] == magic::PICKLE
        && (magic::PICKLE_PROTO_MIN..=magic::PICKLE_PROTO_MAX).contains(&header[1])
    {
        return FileFormat::PickleTensor;
    }

    // 8-byte length followed by a JSON object
    if header.len() >= 9 {
        let mut len_buf = [0u8; 8];
        len_buf.copy_from_slice(&header[..8]);
        let header_size = u64::from_le_bytes(len_buf);
        if header_size > 0 && header_size <= HashConfig::MAX_HEADER_BYTES && header[8] == b'{' {
            return FileFormat::SafeTensors;
        }
    }

    match extension {
        "safetensors" => FileFormat::SafeTensors,
        "pt" | "pth" | "ckpt" | "bin" => FileFormat::PickleTensor,
        "onnx" => FileFormat::Onnx,
        _ => FileFormat::Other,
    }
}
