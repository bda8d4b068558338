//! Queue item types.

use crate::model_library::types::{ModelCategory, Precision, SizeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of a queue item: `Pending -> Downloading -> Done | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DownloadStatus {
    #[default]
    Pending,
    Downloading,
    Done,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Done | DownloadStatus::Failed)
    }

    /// Whether the scheduler may move an item from `self` to `next`.
    pub fn can_transition_to(&self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading) | (Downloading, Done) | (Downloading, Failed)
        )
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadStatus::Pending => "Pending",
            DownloadStatus::Downloading => "Downloading",
            DownloadStatus::Done => "Done",
            DownloadStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// One unit of download and ingestion work, as persisted in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub model_name: String,
    #[serde(rename = "remoteID")]
    pub remote_id: String,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    /// Reserved at creation; never shared with another item.
    pub path: PathBuf,
    /// WebP preview bytes, empty when no preview was available.
    #[serde(default, with = "thumbnail_encoding")]
    pub thumbnail: Vec<u8>,
    #[serde(default)]
    pub thumbnail_hash: String,
    pub status: DownloadStatus,
    /// Fraction in `[0, 1]`.
    pub progress: f64,
    /// Expected size, the progress denominator.
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
    #[serde(rename = "creatorID")]
    pub creator_id: String,
    #[serde(rename = "downloadStarted", default)]
    pub download_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: ModelCategory,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub size_type: SizeType,
    #[serde(default)]
    pub precision_hint: Precision,
    #[serde(default)]
    pub expected_sha256: Option<String>,
}

impl QueueItem {
    /// Expected size in bytes, if the registry reported one.
    pub fn expected_bytes(&self) -> Option<f64> {
        (self.size_mb > 0.0).then(|| self.size_mb * 1024.0 * 1024.0)
    }

    /// Progress for `received` bytes, clamped to `[0, 1]`.
    ///
    /// Without a known size the fraction stays at 0 until completion.
    pub fn progress_for(&self, received: u64) -> f64 {
        progress_fraction(received, self.expected_bytes())
    }

    pub fn view(&self) -> QueueItemView {
        QueueItemView::from(self)
    }
}

/// Thumbnail bytes are stored as one base64 string. Older snapshots wrote a
/// plain byte array, which still loads.
mod thumbnail_encoding {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Encoded(String),
        Raw(Vec<u8>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Stored::deserialize(deserializer)? {
            Stored::Encoded(text) => STANDARD.decode(text).map_err(de::Error::custom),
            Stored::Raw(bytes) => Ok(bytes),
        }
    }
}

/// `received / total`, clamped to `[0, 1]`; 0 when the total is unknown.
pub fn progress_fraction(received: u64, total_bytes: Option<f64>) -> f64 {
    match total_bytes {
        Some(total) if total > 0.0 => (received as f64 / total).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Listing projection of a queue item, without the thumbnail bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemView {
    pub id: String,
    pub model_name: String,
    #[serde(rename = "remoteID")]
    pub remote_id: String,
    pub status: DownloadStatus,
    pub progress: f64,
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
    #[serde(rename = "creatorID")]
    pub creator_id: String,
    pub thumbnail_hash: String,
    pub has_thumbnail: bool,
    pub category: ModelCategory,
    #[serde(rename = "downloadStarted")]
    pub download_started: Option<DateTime<Utc>>,
}

impl From<&QueueItem> for QueueItemView {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id.clone(),
            model_name: item.model_name.clone(),
            remote_id: item.remote_id.clone(),
            status: item.status,
            progress: item.progress,
            size_mb: item.size_mb,
            creator_id: item.creator_id.clone(),
            thumbnail_hash: item.thumbnail_hash.clone(),
            has_thumbnail: !item.thumbnail.is_empty(),
            category: item.category,
            download_started: item.download_started,
        }
    }
}
