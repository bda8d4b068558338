//! Remote model registry integration.
//!
//! This module provides:
//! - Reference parsing (URL or numeric id to model/version ids)
//! - An HTTP client for the registry's versioned JSON API
//! - File selection per version (primary plus auxiliary VAE)
//! - Preview thumbnails with a compact perceptual hash

mod client;
mod reference;
pub mod thumbnail;
mod types;

pub use client::{select_files, RegistryClient};
pub use reference::{parse_reference, ModelReference};
pub use thumbnail::{make_thumbnail, Thumbnail};
pub use types::{
    FileMetadata, RegistryFile, RegistryImage, RegistryModel, RegistryVersion, ResolvedArtifact,
    VersionParent,
};

use crate::error::Result;
use async_trait::async_trait;

/// Turns a user-supplied reference into the files to enqueue.
///
/// Implementations must return `InvalidReference` without any network call
/// when the reference cannot be parsed, and `ResolutionFailed` when a lookup
/// fails. An empty list is a valid answer.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Vec<ResolvedArtifact>>;
}
