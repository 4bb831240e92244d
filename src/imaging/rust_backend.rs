//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::ImageReader` with format sniffing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless, quality ignored) |
//! | Encode → WebP | `webp` crate (lossy libwebp encoder) |
//!
//! HEIC/HEIF have no decoder here. They are still classified as images, so
//! requests for them reach [`decode`](ImageBackend::decode), fail with
//! [`BackendError::Decode`], and the caller serves the original.

use super::backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
use super::params::Quality;
use crate::format::OutputCodec;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_jpeg(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    image
        .write_with_encoder(PngEncoder::new(&mut buf))
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_webp(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    // libwebp only accepts 8-bit RGB or RGBA
    let image = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };
    let encoder = webp::Encoder::from_image(&image)
        .map_err(|e| BackendError::Encode(format!("WebP encode failed: {e}")))?;
    Ok(encoder.encode(quality.value() as f32).to_vec())
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<(DynamicImage, SourceInfo), BackendError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(format!("Failed to sniff format: {e}")))?;
        let format = reader
            .format()
            .ok_or_else(|| BackendError::Decode("Unrecognized image format".to_string()))?;
        let image = reader
            .decode()
            .map_err(|e| BackendError::Decode(format!("Failed to decode {format:?}: {e}")))?;
        let info = SourceInfo {
            format,
            dimensions: Dimensions {
                width: image.width(),
                height: image.height(),
            },
        };
        Ok((image, info))
    }

    fn resize(&self, image: DynamicImage, width: u32, height: u32) -> DynamicImage {
        if image.width() == width && image.height() == height {
            return image;
        }
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        codec: OutputCodec,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        match codec {
            OutputCodec::Jpeg => encode_jpeg(image, quality),
            OutputCodec::Png => encode_png(image),
            OutputCodec::Webp => encode_webp(image, quality),
        }
    }
}
