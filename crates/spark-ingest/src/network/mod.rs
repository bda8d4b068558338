//! Network utilities for artifact downloads.
//!
//! This module provides:
//! - The `ArtifactFetcher` seam and its reqwest implementation
//! - Streaming to a temp file with per-chunk progress and atomic rename

mod download;
mod fetcher;

pub use download::{download_to_path, remove_partial};
pub use fetcher::{ArtifactFetcher, ByteStream, FetchedBody, HttpFetcher};
