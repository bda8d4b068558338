//! Model Library - on-disk model files and their content metadata.
//!
//! This module provides:
//! - Parsing of the length-prefixed tensor container header
//! - Streaming multi-algorithm hashing, including the model hash
//! - Categories, precisions and destination naming for downloaded files

pub mod container;
pub mod hashing;
mod naming;
pub mod types;

pub use container::{detect_format, read_header, ContainerHeader, TensorInfo};
pub use hashing::{compute_model_hash, compute_model_hashes, verify_sha256, ModelHashes};
pub use naming::{destination_path, partial_path, sanitize_file_name};
pub use types::{FileFormat, ModelCategory, Precision, SizeType};
