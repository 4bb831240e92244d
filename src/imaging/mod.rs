//! Image processing — decode, resize, re-encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode + sniff** | `image::ImageReader::with_guessed_format` |
//! | **Resize** | Lanczos3, width-driven, aspect preserved |
//! | **Encode** | JPEG / PNG via `image`, lossy WebP via `webp` |
//! | **Size ceiling** | bounded quality ladder (−15 per step, floor 10, 5 steps) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and quality math (unit testable)
//! - **Parameters**: Data structures describing the requested derivative
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`transform`], the pipeline combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
pub use calculations::{
    MAX_LADDER_ATTEMPTS, QUALITY_FLOOR, QUALITY_STEP, quality_ladder, scale_to_width,
};
pub use operations::{Derivative, transform};
pub use params::{DEFAULT_MAX_PIXELS, Quality, RequestLimits, TransformQuery, TransformRequest};
pub use rust_backend::RustBackend;
