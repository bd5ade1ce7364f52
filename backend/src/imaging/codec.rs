use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};

use super::compress::CompressError;

/// Decode and lossy-encode primitives the compressor relies on. Quality is a
/// monotonic size knob in `(0, 1]`.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CompressError>;
    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<Vec<u8>, CompressError>;
}

pub struct JpegCodec;

/// Maps `(0, 1]` quality onto the encoder's 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

impl ImageCodec for JpegCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CompressError> {
        image::load_from_memory(bytes).map_err(|e| CompressError::Decode(e.to_string()))
    }

    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<Vec<u8>, CompressError> {
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| CompressError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }
}
