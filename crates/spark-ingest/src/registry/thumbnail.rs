//! Preview thumbnails and their perceptual hashes.

use crate::config::ThumbnailConfig;
use crate::error::{IngestError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Encoded preview image plus its compact perceptual hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Thumbnail {
    /// WebP bytes, square, `ThumbnailConfig::EDGE_PX` on each side.
    pub webp: Vec<u8>,
    /// BlurHash string of the resized image.
    pub hash: String,
}

/// Decode a preview image, crop-resize it to a square and encode it.
///
/// CPU-bound; callers on the async runtime should use [`make_thumbnail_async`].
pub fn make_thumbnail(image_bytes: &[u8]) -> Result<Thumbnail> {
    let source = image::load_from_memory(image_bytes)
        .map_err(|e| IngestError::Thumbnail(format!("Failed to decode preview image: {}", e)))?;

    let edge = ThumbnailConfig::EDGE_PX;
    let rgba = source
        .resize_to_fill(edge, edge, FilterType::Lanczos3)
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    let hash = blurhash::encode(
        ThumbnailConfig::HASH_COMPONENTS_X,
        ThumbnailConfig::HASH_COMPONENTS_Y,
        width,
        height,
        rgba.as_raw(),
    )
    .map_err(|e| IngestError::Thumbnail(format!("Failed to compute blurhash: {:?}", e)))?;

    let mut webp = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut webp), ImageFormat::WebP)
        .map_err(|e| IngestError::Thumbnail(format!("Failed to encode thumbnail: {}", e)))?;

    Ok(Thumbnail { webp, hash })
}

/// Run [`make_thumbnail`] on the blocking pool.
pub async fn make_thumbnail_async(image_bytes: Vec<u8>) -> Result<Thumbnail> {
    tokio::task::spawn_blocking(move || make_thumbnail(&image_bytes))
        .await
        .map_err(|e| IngestError::Other(format!("Thumbnail task failed: {}", e)))?
}
