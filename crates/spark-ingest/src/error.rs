//! Error types for the ingestion pipeline.
//!
//! Errors fall into three groups:
//! - caller errors (`InvalidReference`, `ResolutionFailed`) returned from
//!   `enqueue` before anything reaches the queue
//! - item errors (`Io`, `Network`, `MalformedContainer`, `HashMismatch`) that
//!   a worker converts into a `Failed` status
//! - boot errors (`CorruptSnapshot`) that abort startup

use std::path::PathBuf;
use thiserror::Error;

/// Which registry lookup failed while resolving a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStage {
    Model,
    Version,
    Hash,
}

impl std::fmt::Display for LookupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupStage::Model => write!(f, "model"),
            LookupStage::Version => write!(f, "model version"),
            LookupStage::Hash => write!(f, "hash"),
        }
    }
}

/// Main error type for the ingestion crate.
#[derive(Debug, Error)]
pub enum IngestError {
    // Caller errors
    #[error("Invalid model reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Registry {stage} lookup failed for {id}: {message}")]
    ResolutionFailed {
        stage: LookupStage,
        id: String,
        message: String,
    },

    // Transfer and file system errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Content errors
    #[error("Malformed container {path:?}: {message}")]
    MalformedContainer {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Thumbnail generation failed: {0}")]
    Thumbnail(String),

    // Persistence errors
    #[error("Corrupt queue snapshot at {path}: {message}")]
    CorruptSnapshot { path: PathBuf, message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Queue lookups
    #[error("Queue item not found: {id}")]
    QueueItemNotFound { id: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::Network {
            message: err.to_string(),
            cause: err.url().map(|u| u.to_string()),
        }
    }
}

impl IngestError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        IngestError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a malformed-container error for a file.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        IngestError::MalformedContainer {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    /// Errors caused by the reference the caller supplied.
    ///
    /// These are returned from `enqueue` and never reach the queue.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidReference { .. } | IngestError::ResolutionFailed { .. }
        )
    }

    /// Errors that must stop the process from starting.
    pub fn is_fatal_at_boot(&self) -> bool {
        matches!(self, IngestError::CorruptSnapshot { .. })
    }
}
