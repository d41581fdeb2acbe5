// src/decode.rs
//! Decode collaborator and the image helpers used by the file path.

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, ImageReader};
use log::{debug, info};
use rqrr::PreparedImage;

/// Symbol label reported for everything `QrDecoder` finds.
pub const QR_SYMBOL_TYPE: &str = "QRCODE";

/// One code found in an image or frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResult {
    pub payload: String,
    pub symbol_type: String,
}

impl DecodedResult {
    pub fn new(payload: impl Into<String>, symbol_type: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            symbol_type: symbol_type.into(),
        }
    }
}

/// Extracts every readable code from an in-memory image.
///
/// Results come back in the order the implementation finds them. An empty
/// vector means "nothing found" and is not an error.
pub trait Decoder: Send + Sync {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<DecodedResult>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl Decoder for QrDecoder {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<DecodedResult>> {
        let mut prepared = PreparedImage::prepare(image.to_luma8());
        let grids = prepared.detect_grids();
        if !grids.is_empty() {
            debug!("Found {} candidate QR grid(s)", grids.len());
        }

        let mut results = Vec::with_capacity(grids.len());
        for grid in grids {
            let mut bytes = Vec::new();
            if let Err(err) = grid.decode_to(&mut bytes) {
                // Partially visible or damaged symbols are routine on camera frames.
                debug!("Skipping undecodable QR grid: {}", err);
                continue;
            }
            let payload =
                String::from_utf8(bytes).context("QR payload is not valid UTF-8 text")?;
            results.push(DecodedResult::new(payload, QR_SYMBOL_TYPE));
        }
        Ok(results)
    }
}

/// Reads and decodes an image file, guessing the format from its contents.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read {}", path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    info!(
        "Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Size that fits `width`x`height` inside a `max`x`max` box, keeping the
/// aspect ratio. Images already inside the box keep their size.
pub fn thumbnail_size(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

pub fn thumbnail(image: &DynamicImage, max: u32) -> DynamicImage {
    let (width, height) = thumbnail_size(image.width(), image.height(), max);
    if (width, height) == (image.width(), image.height()) {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Triangle)
}
