//! Image retrieval and normalization.
//!
//! Every embedded image ends up as a PNG: vector images are rasterized to a
//! small glyph, raster images are capped in width. Encoding settings are
//! fixed so identical input always produces identical bytes.

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::error::AssetError;
use crate::session::AssetSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    /// Raster images wider than this are downscaled.
    pub max_width: u32,
    /// Vector images are rasterized to a square of this size.
    pub glyph_size: u32,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_width: 800,
            glyph_size: 16,
        }
    }
}

/// Portable image bytes ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedAsset {
    pub bytes: Arc<[u8]>,
    /// File name taken from the source URL, with a `.png` extension.
    pub filename: String,
}

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct AssetPipeline<'a, S: ?Sized> {
    source: &'a S,
    policy: ImagePolicy,
    by_url: HashMap<String, EmbeddedAsset>,
    by_hash: HashMap<String, Arc<[u8]>>,
    /// URLs that already failed, with the reason.
    failed: HashMap<String, String>,
}

impl<'a, S: AssetSource + ?Sized> AssetPipeline<'a, S> {
    pub fn new(source: &'a S, policy: ImagePolicy) -> Self {
        Self {
            source,
            policy,
            by_url: HashMap::new(),
            by_hash: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// `embed(absolute_image_url) -> bytes | failure`
    pub async fn embed(&mut self, url: &Url) -> Result<EmbeddedAsset, AssetError> {
        if let Some(hit) = self.by_url.get(url.as_str()) {
            debug!(url = %url, "Image already embedded");
            return Ok(hit.clone());
        }

        if let Some(reason) = self.failed.get(url.as_str()) {
            debug!(url = %url, "Image failed earlier, not retrying");
            return Err(AssetError::Failed {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        let png = match self.fetch_png(url).await {
            Ok(png) => png,
            Err(e) => {
                self.failed.insert(url.as_str().to_string(), e.to_string());
                return Err(e);
            }
        };

        let hash = content_hash(&png);
        let bytes = self
            .by_hash
            .entry(hash)
            .or_insert_with(|| Arc::from(png))
            .clone();

        let asset = EmbeddedAsset {
            bytes,
            filename: png_filename(url),
        };
        self.by_url.insert(url.as_str().to_string(), asset.clone());
        Ok(asset)
    }

    async fn fetch_png(&self, url: &Url) -> Result<Vec<u8>, AssetError> {
        let raw = self.source.fetch_bytes(url.as_str()).await.map_err(|e| {
            warn!(url = %url, error = %e, "Image download failed");
            e
        })?;

        if is_vector(url, &raw) {
            rasterize_vector(&raw, self.policy.glyph_size)
        } else {
            optimize_raster(&raw, self.policy.max_width)
        }
        .map_err(|e| {
            warn!(url = %url, error = %e, "Image conversion failed");
            e
        })
    }

    /// Distinct image contents embedded so far.
    pub fn unique_images(&self) -> usize {
        self.by_hash.len()
    }
}

fn is_vector(url: &Url, bytes: &[u8]) -> bool {
    if url.path().to_ascii_lowercase().ends_with(".svg") {
        return true;
    }
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// `rasterize_vector(bytes, target_size) -> bytes | failure`
pub fn rasterize_vector(svg: &[u8], size: u32) -> Result<Vec<u8>, AssetError> {
    let tree = usvg::Tree::from_data(svg, &usvg::Options::default())
        .map_err(|e| AssetError::Svg(e.to_string()))?;

    let failed = || AssetError::Rasterize {
        width: size,
        height: size,
    };
    let mut pixmap = Pixmap::new(size, size).ok_or_else(failed)?;
    let view = tree.size();
    if view.width() <= 0.0 || view.height() <= 0.0 {
        return Err(failed());
    }
    let transform = Transform::from_scale(
        size as f32 / view.width(),
        size as f32 / view.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    pixmap_to_png(&pixmap)
}

/// Encodes a rendered pixmap with the same PNG settings as every other image.
pub(crate) fn pixmap_to_png(pixmap: &Pixmap) -> Result<Vec<u8>, AssetError> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let mut rgba = Vec::with_capacity(pixmap.pixels().len() * 4);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or(AssetError::Rasterize { width, height })?;
    encode_png(&DynamicImage::ImageRgba8(image))
}

/// Decodes `bytes`, caps the width at `max_width` and re-encodes as PNG.
pub fn optimize_raster(bytes: &[u8], max_width: u32) -> Result<Vec<u8>, AssetError> {
    let image = image::load_from_memory(bytes).map_err(AssetError::Decode)?;
    encode_png(&resize(image, max_width))
}

/// `resize(image, max_width) -> image`, keeping the aspect ratio.
pub fn resize(image: DynamicImage, max_width: u32) -> DynamicImage {
    if image.width() <= max_width || max_width == 0 {
        return image;
    }
    let height = (u64::from(image.height()) * u64::from(max_width) / u64::from(image.width()))
        .max(1) as u32;
    image.resize_exact(max_width, height, FilterType::Lanczos3)
}

/// `encode(image) -> bytes`, lossless and reproducible.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, AssetError> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive);
    image.write_with_encoder(encoder).map_err(AssetError::Encode)?;
    Ok(out)
}

fn png_filename(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = match cleaned.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => cleaned.as_str(),
    };
    if stem.is_empty() {
        "image.png".to_string()
    } else {
        format!("{}.png", stem)
    }
}
