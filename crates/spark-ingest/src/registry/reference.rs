//! Parsing of user-supplied model references.
//!
//! Accepted forms:
//! - `https://civitai.com/models/4201/some-name?modelVersionId=130072`
//! - `https://civitai.com/models/4201`
//! - `https://civitai.com/api/v1/model-versions/130072`
//! - `https://civitai.com/api/download/models/130072`
//! - `4201` (bare model id)

use crate::error::{IngestError, Result};
use regex::Regex;
use std::sync::LazyLock;

static DOWNLOAD_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/download/models/(\d+)").unwrap());

static VERSION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)model-versions/(\d+)").unwrap());

static MODEL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)models/(\d+)(?:[/?#]|$)").unwrap());

static VERSION_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]modelVersionId=(\d+)").unwrap());

/// Any `/<digits>` path segment, for registry mirrors with other layouts.
static GENERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)(?:[/?#]|$)").unwrap());

static GENERIC_QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?(?:.*&)?[^=&]*=(\d+)").unwrap());

/// Numeric identifiers extracted from a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelReference {
    /// Every version of a model.
    Model { model_id: u64 },
    /// A single version; the parent may be unknown until the version is fetched.
    Version {
        model_id: Option<u64>,
        version_id: u64,
    },
}

/// Extract model/version identifiers without touching the network.
pub fn parse_reference(input: &str) -> Result<ModelReference> {
    let reference = input.trim();
    let invalid = |reason: &str| IngestError::InvalidReference {
        reference: input.to_string(),
        reason: reason.to_string(),
    };

    if reference.is_empty() {
        return Err(invalid("reference is empty"));
    }

    if reference.chars().all(|c| c.is_ascii_digit()) {
        return Ok(ModelReference::Model {
            model_id: parse_id(reference).ok_or_else(|| invalid("model id out of range"))?,
        });
    }

    if let Some(version_id) = capture_id(&DOWNLOAD_PATH, reference)
        .or_else(|| capture_id(&VERSION_PATH, reference))
    {
        return Ok(ModelReference::Version {
            model_id: None,
            version_id,
        });
    }

    let (model_id, version_id) = match capture_id(&MODEL_PATH, reference) {
        Some(model_id) => (model_id, capture_id(&VERSION_QUERY, reference)),
        None => match capture_id(&GENERIC_ID, reference) {
            Some(model_id) => (model_id, capture_id(&GENERIC_QUERY_ID, reference)),
            None => return Err(invalid("no model or version identifier found")),
        },
    };

    Ok(match version_id {
        Some(version_id) => ModelReference::Version {
            model_id: Some(model_id),
            version_id,
        },
        None => ModelReference::Model { model_id },
    })
}

fn capture_id(pattern: &Regex, haystack: &str) -> Option<u64> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_id(m.as_str()))
}

fn parse_id(digits: &str) -> Option<u64> {
    digits.parse().ok()
}
