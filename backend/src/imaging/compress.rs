use std::borrow::Cow;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec::ImageCodec;

pub const QUALITY_FLOOR: f32 = 0.35;
pub const QUALITY_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Initial encode quality in `(0, 1]`
    pub quality: f32,
    pub target_bytes: usize,
    pub max_iterations: u32,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            max_width: 900,
            max_height: 900,
            quality: 0.75,
            target_bytes: 700_000, // well below the 1 MiB document ceiling
            max_iterations: 6,
        }
    }
}

#[derive(Debug)]
pub enum CompressError {
    Decode(String),
    Encode(String),
    /// Even the floor quality overshoots the budget.
    TooLarge { achieved_bytes: usize, target_bytes: usize },
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "Could not decode image: {}", e),
            Self::Encode(e) => write!(f, "Could not encode image: {}", e),
            Self::TooLarge { achieved_bytes, target_bytes } => write!(
                f,
                "Image too large: {} bytes after compression (limit {})",
                achieved_bytes, target_bytes
            ),
        }
    }
}

impl std::error::Error for CompressError {}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub attempts: u32,
}

impl CompressedImage {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.bytes))
    }
}

/// Approximate payload size of a base64 data URL.
pub fn data_url_bytes(data_url: &str) -> usize {
    let base64 = data_url.split_once(',').map(|(_, payload)| payload).unwrap_or("");
    base64.len() * 3 / 4
}

/// Largest size inside the bounding box with the same aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let ratio = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let scaled = |side: u32| ((side as f64 * ratio).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// What [`data_url_bytes`] reports for these bytes once base64 encoded.
fn encoded_size(bytes: &[u8]) -> usize {
    (bytes.len() + 2) / 3 * 3
}

pub fn compress_bytes(
    codec: &dyn ImageCodec,
    bytes: &[u8],
    config: &CompressConfig,
) -> Result<CompressedImage, CompressError> {
    let image = codec.decode(bytes)?;
    compress_image(codec, &image, config)
}

/// Returns the first encode that fits `target_bytes`, not the best one.
/// The budget is checked against the data URL payload estimate
/// ([`data_url_bytes`]), which can exceed the raw JPEG length by up to 2 bytes.
pub fn compress_image(
    codec: &dyn ImageCodec,
    image: &DynamicImage,
    config: &CompressConfig,
) -> Result<CompressedImage, CompressError> {
    let (source_width, source_height) = image.dimensions();
    let (width, height) = fit_within(source_width, source_height, config.max_width, config.max_height);

    let resized = if (width, height) == (source_width, source_height) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image.resize_exact(width, height, FilterType::Triangle))
    };

    let mut quality = config.quality;
    let mut attempts = 0;
    for _ in 0..config.max_iterations {
        let bytes = codec.encode(&resized, quality)?;
        attempts += 1;
        debug!("Encoded {}x{} at quality {:.2}: {} bytes", width, height, quality, bytes.len());
        if encoded_size(&bytes) <= config.target_bytes {
            return Ok(CompressedImage { bytes, width, height, quality, attempts });
        }
        quality = (quality - QUALITY_STEP).max(QUALITY_FLOOR);
    }

    let bytes = codec.encode(&resized, QUALITY_FLOOR)?;
    attempts += 1;
    let achieved_bytes = encoded_size(&bytes);
    if achieved_bytes > config.target_bytes {
        return Err(CompressError::TooLarge {
            achieved_bytes,
            target_bytes: config.target_bytes,
        });
    }
    Ok(CompressedImage { bytes, width, height, quality: QUALITY_FLOOR, attempts })
}
