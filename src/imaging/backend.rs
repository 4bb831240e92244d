//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three primitives the transform
//! pipeline is built from: decode, resize, and encode. Keeping them separate
//! (rather than one `render` call) lets the quality ladder re-encode the same
//! decoded pixels without decoding the original again.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use a recording
//! `MockBackend` whose "image" is just its dimensions.

use super::params::Quality;
use crate::format::OutputCodec;
use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// Input bytes are not a decodable image of a supported format.
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    /// Requested output exceeds the pixel budget; refused before allocating.
    #[error("Output {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Intrinsic metadata read while decoding an original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub format: ImageFormat,
    pub dimensions: Dimensions,
}

/// Trait for image processing backends.
///
/// `Send + Sync` because a single backend instance is shared by every worker
/// thread in the [`TransformPool`](crate::process::TransformPool).
pub trait ImageBackend: Send + Sync {
    /// Decoded pixel data, opaque to the pipeline.
    type Image;

    /// Decode an original and report its detected format and dimensions.
    fn decode(&self, bytes: &[u8]) -> Result<(Self::Image, SourceInfo), BackendError>;

    /// Resize to exactly `width` x `height`.
    fn resize(&self, image: Self::Image, width: u32, height: u32) -> Self::Image;

    /// Encode with the given codec and quality.
    fn encode(
        &self,
        image: &Self::Image,
        codec: OutputCodec,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
