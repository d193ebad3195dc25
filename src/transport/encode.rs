//! JPEG encoding of captured frames.

use super::TransportError;
use crate::capture::{Frame, PixelFormat};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Content type sent with every payload.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Encodes a frame as a JPEG image at the given quality (1-100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, TransportError> {
    // The encoder asserts on buffer size, so check before handing it over.
    if !frame.is_valid() {
        return Err(TransportError::Encode {
            device: frame.device(),
            reason: format!(
                "{} bytes do not describe a {}x{} {:?} frame",
                frame.pixels().len(),
                frame.width(),
                frame.height(),
                frame.format()
            ),
        });
    }

    let color = match frame.format() {
        PixelFormat::Gray8 => ExtendedColorType::L8,
        PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
    };

    let mut payload = Vec::with_capacity(frame.pixels().len() / 8);
    JpegEncoder::new_with_quality(&mut payload, quality.clamp(1, 100))
        .encode(frame.pixels(), frame.width(), frame.height(), color)
        .map_err(|e| TransportError::Encode {
            device: frame.device(),
            reason: e.to_string(),
        })?;

    Ok(payload)
}
