//! Upload-time image processing.
//!
//! Accepted formats are JPEG, PNG, and WebP. Anything wider or taller than
//! `MAX_DIMENSION_PX` is downscaled to fit, preserving aspect ratio, and
//! re-encoded as JPEG. Smaller uploads pass through byte-for-byte.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};

use crate::errors::AppError;

const MAX_DIMENSION_PX: u32 = 1000;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug)]
pub struct ProcessedImage {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub extension: &'static str,
}

pub fn process_upload(data: &[u8]) -> Result<ProcessedImage, AppError> {
    let format = image::guess_format(data)
        .map_err(|_| AppError::Validation("Unrecognized image data".to_string()))?;
    let (content_type, extension) = match format {
        ImageFormat::Jpeg => ("image/jpeg", "jpg"),
        ImageFormat::Png => ("image/png", "png"),
        ImageFormat::WebP => ("image/webp", "webp"),
        other => {
            return Err(AppError::Validation(format!(
                "Unsupported image format {other:?}; use JPEG, PNG, or WebP"
            )))
        }
    };

    let img = image::load_from_memory(data)
        .map_err(|e| AppError::Validation(format!("Could not decode image: {e}")))?;
    let (width, height) = img.dimensions();

    if width <= MAX_DIMENSION_PX && height <= MAX_DIMENSION_PX {
        return Ok(ProcessedImage {
            bytes: Bytes::copy_from_slice(data),
            content_type,
            extension,
        });
    }

    let resized = img.resize(MAX_DIMENSION_PX, MAX_DIMENSION_PX, FilterType::Triangle);
    let mut encoded = Cursor::new(Vec::new());
    resized
        .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to re-encode image: {e}")))?;

    Ok(ProcessedImage {
        bytes: Bytes::from(encoded.into_inner()),
        content_type: "image/jpeg",
        extension: "jpg",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage, RgbaImage};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).expect("test image encodes");
        out.into_inner()
    }

    #[test]
    fn test_small_png_passes_through_unchanged() {
        let data = encode(640, 480, ImageFormat::Png);
        let processed = process_upload(&data).unwrap();

        assert_eq!(processed.content_type, "image/png");
        assert_eq!(processed.extension, "png");
        assert_eq!(processed.bytes.as_ref(), data.as_slice());
    }

    #[test]
    fn test_jpeg_is_detected() {
        let data = encode(320, 240, ImageFormat::Jpeg);
        let processed = process_upload(&data).unwrap();

        assert_eq!(processed.content_type, "image/jpeg");
        assert_eq!(processed.extension, "jpg");
    }

    #[test]
    fn test_oversized_image_is_downscaled_to_jpeg() {
        let data = encode(2400, 1200, ImageFormat::Png);
        let processed = process_upload(&data).unwrap();

        assert_eq!(processed.content_type, "image/jpeg");
        let resized = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!(resized.dimensions(), (1000, 500));
    }

    #[test]
    fn test_portrait_orientation_is_preserved() {
        let data = encode(1200, 2400, ImageFormat::Jpeg);
        let processed = process_upload(&data).unwrap();

        let resized = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!(resized.dimensions(), (500, 1000));
    }

    #[test]
    fn test_oversized_rgba_png_is_reencoded_as_jpeg() {
        // PNGs with an alpha channel still have to survive the JPEG re-encode.
        let img = DynamicImage::ImageRgba8(RgbaImage::new(1400, 700));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("test image encodes");

        let processed = process_upload(&out.into_inner()).unwrap();

        assert_eq!(processed.content_type, "image/jpeg");
        assert_eq!(processed.extension, "jpg");
        let resized = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!(resized.dimensions(), (1000, 500));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = process_upload(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_bmp_is_rejected() {
        let data = encode(100, 100, ImageFormat::Bmp);
        let err = process_upload(&data).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
