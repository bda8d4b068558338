//! Registry API response types and resolved download descriptors.

use crate::model_library::types::{ModelCategory, Precision, SizeType};
use crate::registry::thumbnail::Thumbnail;
use serde::Deserialize;
use std::collections::HashMap;

/// `GET /models/{id}` payload (fields the queue uses).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryModel {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub model_versions: Vec<RegistryVersion>,
}

/// Parent summary embedded in a version payload.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionParent {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// `GET /model-versions/{id}` payload, also embedded in model payloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryVersion {
    pub id: u64,
    #[serde(default)]
    pub model_id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub files: Vec<RegistryFile>,
    #[serde(default)]
    pub images: Vec<RegistryImage>,
    #[serde(default)]
    pub model: Option<VersionParent>,
}

/// A downloadable file attached to a version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFile {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(rename = "sizeKB", default)]
    pub size_kb: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: FileMetadata,
    /// Algorithm name (`SHA256`, `BLAKE3`, `AutoV2`, ...) to hex digest.
    #[serde(default)]
    pub hashes: HashMap<String, String>,
    pub download_url: String,
}

impl RegistryFile {
    /// Auxiliary companion weights (decoder VAE) get their own queue item.
    pub fn is_auxiliary(&self) -> bool {
        self.kind.eq_ignore_ascii_case("vae")
    }

    pub fn is_pruned(&self) -> bool {
        SizeType::from_registry(self.metadata.size.as_deref()) == SizeType::Pruned
    }

    /// Registry-declared SHA256, if listed.
    pub fn sha256(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|(algo, _)| algo.eq_ignore_ascii_case("sha256"))
            .map(|(_, digest)| digest.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub fp: Option<String>,
}

/// Preview image attached to a version.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// One file to enqueue, produced by resolving a reference.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    /// Display name, `"<model> - <version>"` with a ` (VAE)` suffix for auxiliary files.
    pub model_name: String,
    /// Registry version id the file belongs to.
    pub remote_id: String,
    pub download_url: String,
    pub file_name: String,
    pub category: ModelCategory,
    pub size_kb: f64,
    pub size_type: SizeType,
    /// Precision declared by the registry, used when the header has none.
    pub precision_hint: Precision,
    pub expected_sha256: Option<String>,
    pub thumbnail: Thumbnail,
}
