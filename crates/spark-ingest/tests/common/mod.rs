//! In-process fake of the model registry for integration tests.
//!
//! Serves one checkpoint model (id 4201) with two versions:
//! - version 11: a pruned primary file, a full file and a VAE, plus a preview
//! - version 12: a single file and no preview
//!
//! and a stray version 13 whose declared SHA256 does not match its bytes.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const HEADER: &str = r#"{"__metadata__":{"format":"pt"},"unet.weight":{"dtype":"F16","shape":[2,2],"data_offsets":[0,8]}}"#;

/// Container bytes for a file served by the fake registry.
pub fn model_bytes(seed: u8) -> Vec<u8> {
    let mut bytes = (HEADER.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(HEADER.as_bytes());
    bytes.extend((0..64u8).map(|i| i.wrapping_mul(seed)));
    bytes
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn preview_png() -> Vec<u8> {
    let img = RgbImage::from_fn(96, 64, |x, y| Rgb([x as u8 * 2, y as u8 * 3, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub struct FakeRegistry {
    pub base_url: String,
    pub api_base: String,
    /// `Authorization` header of every API request, in arrival order.
    pub auth_headers: Mutex<Vec<Option<String>>>,
}

impl FakeRegistry {
    fn file(&self, name: &str, kind: &str, seed: u8, size: &str, sha: &str) -> Value {
        json!({
            "name": format!("{}.safetensors", name),
            "type": kind,
            "sizeKB": model_bytes(seed).len() as f64 / 1024.0,
            "metadata": { "fp": "fp16", "size": size, "format": "SafeTensor" },
            "hashes": { "AutoV2": "ABCDEF0123", "SHA256": sha.to_uppercase() },
            "downloadUrl": format!("{}/files/{}", self.base_url, seed),
        })
    }

    fn version(&self, id: u64) -> Option<Value> {
        let version = match id {
            11 => json!({
                "id": 11,
                "modelId": 4201,
                "name": "v1",
                "baseModel": "SD 1.5",
                "files": [
                    self.file("dreamy-full", "Model", 1, "full", &sha256_hex(&model_bytes(1))),
                    self.file("dreamy-pruned", "Model", 2, "pruned", &sha256_hex(&model_bytes(2))),
                    self.file("dreamy-vae", "VAE", 3, "full", &sha256_hex(&model_bytes(3))),
                ],
                "images": [{ "url": format!("{}/images/preview.png", self.base_url), "width": 96, "height": 64 }],
            }),
            12 => json!({
                "id": 12,
                "modelId": 4201,
                "name": "v2",
                "files": [self.file("dreamy-v2", "Model", 4, "full", &sha256_hex(&model_bytes(4)))],
                "images": [],
            }),
            13 => json!({
                "id": 13,
                "name": "tampered",
                "model": { "name": "Stray", "type": "LORA" },
                "files": [self.file("stray", "Model", 5, "pruned", &"ab".repeat(32))],
            }),
            _ => return None,
        };
        Some(version)
    }

    fn model(&self, id: u64) -> Option<Value> {
        (id == 4201).then(|| {
            json!({
                "id": 4201,
                "name": "Dreamy",
                "type": "Checkpoint",
                "nsfw": false,
                "modelVersions": [self.version(11), self.version(12)],
            })
        })
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.lock().unwrap().push(auth);
    }
}

type Shared = Arc<FakeRegistry>;

async fn get_model(State(reg): State<Shared>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    reg.record_auth(&headers);
    match reg.model(id) {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_version(
    State(reg): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    reg.record_auth(&headers);
    match reg.version(id) {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_by_hash(
    State(reg): State<Shared>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Response {
    reg.record_auth(&headers);
    let hash = hash.to_lowercase();
    let known = sha256_hex(&model_bytes(2));
    if hash == known || known.starts_with(&hash) {
        Json(reg.version(11)).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_file(Path(seed): Path<u8>) -> Response {
    if seed == 0 {
        return StatusCode::NOT_FOUND.into_response();
    }
    // Small delay so concurrent downloads overlap
    tokio::time::sleep(Duration::from_millis(20)).await;
    Body::from(model_bytes(seed)).into_response()
}

async fn get_image() -> Response {
    ([("content-type", "image/png")], preview_png()).into_response()
}

/// Bind the fake registry on an ephemeral port and serve it in the background.
pub async fn spawn_registry() -> Arc<FakeRegistry> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let registry = Arc::new(FakeRegistry {
        api_base: format!("{}/api/v1", base_url),
        base_url,
        auth_headers: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/api/v1/models/:id", get(get_model))
        .route("/api/v1/model-versions/:id", get(get_version))
        .route("/api/v1/model-versions/by-hash/:hash", get(get_by_hash))
        .route("/files/:seed", get(get_file))
        .route("/images/preview.png", get(get_image))
        .with_state(Arc::clone(&registry));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    registry
}

/// Poll `check` until it holds, panicking after a few seconds.
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
