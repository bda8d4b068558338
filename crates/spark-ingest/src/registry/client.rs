//! HTTP client for the model registry API.

use super::reference::{parse_reference, ModelReference};
use super::thumbnail::{make_thumbnail_async, Thumbnail};
use super::types::{RegistryFile, RegistryModel, RegistryVersion, ResolvedArtifact};
use super::ModelResolver;
use crate::config::{IngestConfig, NetworkConfig};
use crate::error::{IngestError, LookupStage, Result};
use crate::model_library::types::{ModelCategory, Precision, SizeType};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Client for the registry's versioned JSON API.
pub struct RegistryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl RegistryClient {
    /// Create a client for the registry configured in `config`.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| IngestError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            base_url: config.registry_base_url.trim_end_matches('/').to_string(),
            api_key: config.registry_api_key.clone(),
        })
    }

    /// `GET /models/{id}`.
    pub async fn get_model(&self, model_id: u64) -> Result<RegistryModel> {
        self.get_json(&format!("models/{}", model_id), LookupStage::Model, model_id.to_string())
            .await
    }

    /// `GET /model-versions/{id}`.
    pub async fn get_version(&self, version_id: u64) -> Result<RegistryVersion> {
        self.get_json(
            &format!("model-versions/{}", version_id),
            LookupStage::Version,
            version_id.to_string(),
        )
        .await
    }

    /// `GET /model-versions/by-hash/{hash}`.
    ///
    /// Accepts any hash the registry indexes (model hash, SHA256, BLAKE3).
    pub async fn version_by_hash(&self, hash: &str) -> Result<RegistryVersion> {
        let hash = hash.trim();
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IngestError::InvalidReference {
                reference: hash.to_string(),
                reason: "hash must be a non-empty hex string".to_string(),
            });
        }
        self.get_json(
            &format!("model-versions/by-hash/{}", hash),
            LookupStage::Hash,
            hash.to_string(),
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        stage: LookupStage,
        id: String,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Registry request: GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let failed = |message: String| IngestError::ResolutionFailed {
            stage,
            id: id.clone(),
            message,
        };

        let response = request
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(failed(format!("registry returned {}", response.status())));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| failed(format!("unexpected response body: {}", e)))
    }

    /// Fetch the first preview image of a version and build its thumbnail.
    ///
    /// Missing or undecodable previews yield an empty thumbnail.
    async fn fetch_preview(&self, version: &RegistryVersion) -> Thumbnail {
        let Some(image) = version.images.first() else {
            debug!("Version {} has no preview images", version.id);
            return Thumbnail::default();
        };

        let bytes = match self.fetch_image_bytes(&image.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to fetch preview {} for version {}: {}", image.url, version.id, e);
                return Thumbnail::default();
            }
        };

        match make_thumbnail_async(bytes).await {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                warn!("Failed to build thumbnail for version {}: {}", version.id, e);
                Thumbnail::default()
            }
        }
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Network {
                message: format!("image request returned {}", response.status()),
                cause: Some(url.to_string()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Resolve a reference into downloadable files, one or two per version.
    pub async fn resolve(&self, reference: &str) -> Result<Vec<ResolvedArtifact>> {
        let parsed = parse_reference(reference)?;

        let (parent_name, parent_kind, versions) = match parsed {
            ModelReference::Version {
                model_id,
                version_id,
            } => {
                let version = self.get_version(version_id).await?;
                let (name, kind) = match model_id.or(version.model_id) {
                    Some(model_id) => {
                        let model = self.get_model(model_id).await?;
                        (model.name, model.kind)
                    }
                    None => match version.model.clone() {
                        Some(parent) => (parent.name, parent.kind),
                        None => {
                            return Err(IngestError::ResolutionFailed {
                                stage: LookupStage::Model,
                                id: format!("parent of version {}", version_id),
                                message: "version payload names no parent model".to_string(),
                            })
                        }
                    },
                };
                (name, kind, vec![version])
            }
            ModelReference::Model { model_id } => {
                let model = self.get_model(model_id).await?;
                (model.name, model.kind, model.model_versions)
            }
        };

        let category = ModelCategory::from_registry_type(&parent_kind);
        let mut artifacts = Vec::new();

        for version in &versions {
            let selected = select_files(version);
            if selected.is_empty() {
                debug!("Version {} lists no downloadable files", version.id);
                continue;
            }

            let thumbnail = self.fetch_preview(version).await;
            let base_name = format!("{} - {}", parent_name, version.name);

            for file in selected {
                let (model_name, file_category) = if file.is_auxiliary() {
                    (format!("{} (VAE)", base_name), ModelCategory::Vae)
                } else {
                    (base_name.clone(), category)
                };

                artifacts.push(ResolvedArtifact {
                    model_name,
                    remote_id: version.id.to_string(),
                    download_url: file.download_url.clone(),
                    file_name: file.name.clone(),
                    category: file_category,
                    size_kb: file.size_kb,
                    size_type: SizeType::from_registry(file.metadata.size.as_deref()),
                    precision_hint: file
                        .metadata
                        .fp
                        .as_deref()
                        .map(Precision::from_dtype)
                        .unwrap_or_default(),
                    expected_sha256: file.sha256().map(|s| s.to_lowercase()),
                    thumbnail: thumbnail.clone(),
                });
            }
        }

        info!(
            "Resolved {:?} to {} file(s) across {} version(s)",
            reference,
            artifacts.len(),
            versions.len()
        );
        Ok(artifacts)
    }
}

#[async_trait]
impl ModelResolver for RegistryClient {
    async fn resolve(&self, reference: &str) -> Result<Vec<ResolvedArtifact>> {
        RegistryClient::resolve(self, reference).await
    }
}

/// Pick the files of a version to enqueue.
///
/// Auxiliary files come first, in listing order, then the primary file: the
/// last non-auxiliary file marked pruned, or else the first non-auxiliary file.
pub fn select_files(version: &RegistryVersion) -> Vec<&RegistryFile> {
    let mut selected: Vec<&RegistryFile> =
        version.files.iter().filter(|f| f.is_auxiliary()).collect();

    let candidates = version.files.iter().filter(|f| !f.is_auxiliary());
    let primary = candidates
        .clone()
        .filter(|f| f.is_pruned())
        .last()
        .or_else(|| candidates.clone().next());

    if let Some(primary) = primary {
        selected.push(primary);
    }
    selected
}
