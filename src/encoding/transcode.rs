//! WebP transcoding

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Input is not an image format we can decode
    #[error("unreadable image data: {0}")]
    Decode(#[from] image::ImageError),

    #[error("webp encoding failed: {0}")]
    Encode(String),
}

/// Decode image from bytes (JPEG, PNG, GIF, BMP, ...)
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, TranscodeError> {
    let img = image::load_from_memory(data)?;
    Ok(img)
}

/// Encode image to lossy WebP bytes
pub fn encode_webp(image: &DynamicImage, quality: f32) -> Result<Vec<u8>, TranscodeError> {
    // libwebp only takes 8-bit RGB/RGBA buffers
    let encoder_input = match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image.clone(),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    let encoder = webp::Encoder::from_image(&encoder_input)
        .map_err(|e| TranscodeError::Encode(e.to_string()))?;
    let memory = encoder
        .encode_simple(false, quality)
        .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))?;

    Ok(memory.to_vec())
}

/// Transcode arbitrary image bytes to WebP
pub fn to_webp(data: &[u8], quality: f32) -> Result<Vec<u8>, TranscodeError> {
    let image = decode_image(data)?;
    encode_webp(&image, quality)
}
