//! Size gate and conditional WebP re-encoding for uploads

use thiserror::Error;

use super::b64::{b64_len, encode_b64};
use super::transcode::{to_webp, TranscodeError};

pub const WEBP_CONTENT_TYPE: &str = "image/webp";

/// Why an upload was refused. These are client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("too large, transcode disabled")]
    TranscodeDisabled,

    #[error("still too large after transcode")]
    StillTooLarge,

    #[error("unreadable image data")]
    Unreadable,
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The encoder itself failed on a decodable image
    #[error("transcoder failure: {0}")]
    Transcoder(String),
}

/// What gets written to the store after the gate accepted an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPayload {
    pub filename: String,
    pub content_type: String,
    pub encoded_payload: String,
    pub transcoded: bool,
}

impl PreparedPayload {
    pub fn size_b64(&self) -> usize {
        self.encoded_payload.len()
    }
}

#[derive(Debug, Clone)]
pub struct EncodingGate {
    max_b64_bytes: usize,
    webp_quality: f32,
}

impl EncodingGate {
    pub fn new(max_b64_bytes: usize, webp_quality: f32) -> Self {
        Self {
            max_b64_bytes,
            webp_quality,
        }
    }

    pub fn max_b64_bytes(&self) -> usize {
        self.max_b64_bytes
    }

    /// Accept `raw` as-is when its base64 footprint fits, otherwise transcode
    /// to WebP (if allowed) and check again.
    pub fn prepare(
        &self,
        raw: &[u8],
        declared_content_type: &str,
        declared_filename: &str,
        allow_transcode: bool,
    ) -> Result<PreparedPayload, PrepareError> {
        if b64_len(raw.len()) <= self.max_b64_bytes {
            return Ok(PreparedPayload {
                filename: declared_filename.to_string(),
                content_type: declared_content_type.to_string(),
                encoded_payload: encode_b64(raw),
                transcoded: false,
            });
        }

        if !allow_transcode {
            return Err(Rejection::TranscodeDisabled.into());
        }

        let webp = to_webp(raw, self.webp_quality).map_err(|e| match e {
            TranscodeError::Decode(_) => PrepareError::Rejected(Rejection::Unreadable),
            TranscodeError::Encode(msg) => PrepareError::Transcoder(msg),
        })?;

        if b64_len(webp.len()) > self.max_b64_bytes {
            return Err(Rejection::StillTooLarge.into());
        }

        Ok(PreparedPayload {
            filename: format!("{}.webp", strip_extension(declared_filename)),
            content_type: WEBP_CONTENT_TYPE.to_string(),
            encoded_payload: encode_b64(&webp),
            transcoded: true,
        })
    }
}

/// Drop the last extension of the final path component, keeping any
/// directory prefix. Leading dots of the component do not start an
/// extension, and a name ending in `/` has no extension at all.
pub fn strip_extension(filename: &str) -> &str {
    let name_start = filename.rfind('/').map_or(0, |i| i + 1);
    let name = &filename[name_start..];

    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => &filename[..name_start + dot],
        _ => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::b64::decode_b64;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn bmp_bytes(image: DynamicImage) -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buffer, image::ImageFormat::Bmp).unwrap();
        buffer.into_inner()
    }

    /// Flat colour: huge as BMP, tiny as WebP
    fn flat_bmp(size: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(size, size, Rgb([10u8, 120, 200]));
        bmp_bytes(DynamicImage::ImageRgb8(img))
    }

    /// Pseudo-random noise that no lossy codec can squeeze much
    fn noise_bmp(size: u32) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let img = ImageBuffer::from_fn(size, size, |_, _| {
            let mut next = || {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            };
            Rgb([next(), next(), next()])
        });
        bmp_bytes(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_small_input_passes_through_losslessly() {
        let gate = EncodingGate::new(1024, 80.0);
        let raw = b"\x89PNG\r\n\x1a\n\x00\x00";

        let prepared = gate.prepare(raw, "image/png", "cat.png", true).unwrap();
        assert_eq!(prepared.filename, "cat.png");
        assert_eq!(prepared.content_type, "image/png");
        assert_eq!(prepared.size_b64(), 16);
        assert!(!prepared.transcoded);
        assert_eq!(decode_b64(&prepared.encoded_payload).unwrap(), raw);
    }

    #[test]
    fn test_exact_ceiling_is_accepted() {
        // 12 bytes -> 16 base64 chars
        let gate = EncodingGate::new(16, 80.0);
        let prepared = gate.prepare(&[7u8; 12], "image/gif", "a.gif", false).unwrap();
        assert_eq!(prepared.size_b64(), 16);

        let err = gate.prepare(&[7u8; 13], "image/gif", "a.gif", false).unwrap_err();
        assert!(matches!(err, PrepareError::Rejected(Rejection::TranscodeDisabled)));
    }

    #[test]
    fn test_empty_input_is_accepted() {
        let gate = EncodingGate::new(0, 80.0);
        let prepared = gate.prepare(&[], "image/png", "empty.png", false).unwrap();
        assert_eq!(prepared.encoded_payload, "");
        assert_eq!(prepared.size_b64(), 0);
    }

    #[test]
    fn test_oversized_without_transcode_is_rejected() {
        let gate = EncodingGate::new(4096, 80.0);
        let raw = flat_bmp(64);

        let err = gate.prepare(&raw, "image/bmp", "flat.bmp", false).unwrap_err();
        assert!(matches!(err, PrepareError::Rejected(Rejection::TranscodeDisabled)));
    }

    #[test]
    fn test_oversized_is_transcoded_to_webp() {
        let gate = EncodingGate::new(4096, 80.0);
        let raw = flat_bmp(64);
        assert!(b64_len(raw.len()) > 4096);

        let prepared = gate.prepare(&raw, "image/bmp", "photos/flat.bmp", true).unwrap();
        assert!(prepared.transcoded);
        assert_eq!(prepared.content_type, WEBP_CONTENT_TYPE);
        assert_eq!(prepared.filename, "photos/flat.webp");
        assert!(prepared.size_b64() <= 4096);

        let bytes = decode_b64(&prepared.encoded_payload).unwrap();
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_still_too_large_is_distinct_rejection() {
        let gate = EncodingGate::new(4096, 80.0);
        let raw = noise_bmp(256);

        let err = gate.prepare(&raw, "image/bmp", "noise.bmp", true).unwrap_err();
        assert!(matches!(err, PrepareError::Rejected(Rejection::StillTooLarge)));
        assert_ne!(Rejection::StillTooLarge, Rejection::TranscodeDisabled);
    }

    #[test]
    fn test_unreadable_bytes_are_rejected() {
        let gate = EncodingGate::new(100, 80.0);
        let raw = vec![0u8; 10_000];

        let err = gate.prepare(&raw, "image/png", "zeros.png", true).unwrap_err();
        assert!(matches!(err, PrepareError::Rejected(Rejection::Unreadable)));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("photo.jpg"), "photo");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(".hidden"), ".hidden");
        assert_eq!(strip_extension("dir.v2/photo"), "dir.v2/photo");
        assert_eq!(strip_extension("dir/photo.png"), "dir/photo");
        assert_eq!(strip_extension("photo."), "photo");
        assert_eq!(strip_extension("..hidden"), "..hidden");
        assert_eq!(strip_extension("..a.b"), "..a");
        assert_eq!(strip_extension("photo.\u{e9}"), "photo");
    }

    #[test]
    fn test_strip_extension_trailing_slash() {
        assert_eq!(strip_extension("a.\u{e9}//"), "a.\u{e9}//");
        assert_eq!(strip_extension("dir/photo.png/"), "dir/photo.png/");
        assert_eq!(strip_extension("/"), "/");
    }

    #[test]
    fn test_transcode_keeps_odd_filename_intact() {
        let gate = EncodingGate::new(4096, 80.0);
        let raw = flat_bmp(64);

        let prepared = gate.prepare(&raw, "image/bmp", "a.\u{e9}//", true).unwrap();
        assert_eq!(prepared.filename, "a.\u{e9}//.webp");
        assert_eq!(prepared.content_type, WEBP_CONTENT_TYPE);
    }
}
