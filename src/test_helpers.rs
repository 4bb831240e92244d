//! Shared test utilities for the diary-media test suite.
//!
//! Synthetic images are generated in memory so tests need no fixture files.
//! Noise is derived from pixel coordinates, never from an RNG, so the same
//! call always yields the same bytes.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let original = noisy_jpeg(2000, 1000, 90);
//! let tmp = media_dirs();
//! std::fs::write(tmp.path().join("originals/photo.jpg"), &original).unwrap();
//! ```

use image::{DynamicImage, ImageEncoder, RgbImage, RgbaImage};
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Deterministic per-pixel noise in `0..=255`.
fn noise(x: u32, y: u32, salt: u32) -> u8 {
    let h = x
        .wrapping_mul(0x9E37_79B1)
        .wrapping_add(y.wrapping_mul(0x85EB_CA77))
        .wrapping_add(salt.wrapping_mul(0xC2B2_AE3D));
    let h = (h ^ (h >> 15)).wrapping_mul(0x2C1B_3C6D);
    (h >> 24) as u8
}

/// Gradient plus noise: compresses badly, so quality changes move the size.
pub fn noisy_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let base = ((x + y) % 256) as u8;
        image::Rgb([
            base.wrapping_add(noise(x, y, 1) / 2),
            noise(x, y, 2),
            (y % 256) as u8 ^ noise(x, y, 3) / 4,
        ])
    })
}

/// Encode a noisy RGB image as JPEG at `quality`.
pub fn noisy_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = noisy_rgb(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A small RGBA image with a transparent corner.
pub fn synthetic_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x < width / 2 && y < height / 2 { 0 } else { 255 };
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, alpha])
    }))
}

/// Encode [`synthetic_rgba`] as PNG.
pub fn synthetic_png(width: u32, height: u32) -> Vec<u8> {
    let img = synthetic_rgba(width, height).to_rgba8();
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

// =========================================================================
// Directory setup
// =========================================================================

/// Temp directory with empty `originals/` and `cache/` subdirectories.
pub fn media_dirs() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("originals")).unwrap();
    std::fs::create_dir_all(tmp.path().join("cache")).unwrap();
    tmp
}
