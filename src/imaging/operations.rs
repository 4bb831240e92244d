//! The transform pipeline.
//!
//! [`transform`] turns original bytes plus a [`TransformRequest`] into an
//! encoded derivative:
//!
//! 1. Decode, reading the detected format and dimensions.
//! 2. Resize to the requested width (height follows the aspect ratio).
//! 3. Encode with the codec picked by [`OutputCodec::for_format`].
//! 4. If a byte ceiling is set and exceeded, walk the
//!    [`quality_ladder`] re-encoding until the output fits or the ladder
//!    runs out. The last attempt is returned either way.
//!
//! No filesystem access happens here; callers own reading originals and
//! writing the cache.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{quality_ladder, scale_to_width};
use super::params::{Quality, TransformRequest};
use crate::format::OutputCodec;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// An encoded derivative and how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivative {
    pub bytes: Vec<u8>,
    pub codec: OutputCodec,
    /// Quality of the final encode (lower than requested if the ladder ran).
    pub quality: Quality,
    pub dimensions: Dimensions,
    /// Re-encodes performed after the first encode.
    pub ladder_attempts: usize,
}

impl Derivative {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Run the transform pipeline on `original`.
pub fn transform(
    backend: &impl ImageBackend,
    original: &[u8],
    request: &TransformRequest,
) -> Result<Derivative> {
    let (image, info) = backend.decode(original)?;

    let (image, dimensions) = match request.width {
        Some(target) => {
            let (width, height) = scale_to_width(
                (info.dimensions.width, info.dimensions.height),
                target,
            );
            // A failed allocation aborts the process, so oversized buffers
            // must be refused before the backend tries to build them
            if u64::from(width) * u64::from(height) > request.max_pixels {
                return Err(BackendError::TooLarge {
                    width,
                    height,
                    max_pixels: request.max_pixels,
                });
            }
            (
                backend.resize(image, width, height),
                Dimensions { width, height },
            )
        }
        None => (image, info.dimensions),
    };

    let codec = OutputCodec::for_format(info.format);
    let mut quality = request.quality;
    let mut bytes = backend.encode(&image, codec, quality)?;
    let mut ladder_attempts = 0;

    if let Some(limit) = request.max_bytes()
        && codec.is_lossy()
    {
        for step in quality_ladder(request.quality) {
            if bytes.len() as u64 <= limit {
                break;
            }
            tracing::debug!(
                source = %request.source,
                size = bytes.len(),
                limit,
                from = quality.value(),
                to = step.value(),
                "over size limit, re-encoding"
            );
            bytes = backend.encode(&image, codec, step)?;
            quality = step;
            ladder_attempts += 1;
        }
    }

    Ok(Derivative {
        bytes,
        codec,
        quality,
        dimensions,
        ladder_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{DEFAULT_MAX_PIXELS, RustBackend};
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::noisy_jpeg;
    use image::ImageFormat;

    fn request(width: Option<u32>, quality: u32, max_size_kb: Option<u32>) -> TransformRequest {
        TransformRequest {
            source: "photo.jpg".to_string(),
            width,
            quality: Quality::new(quality),
            max_size_kb,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    // =========================================================================
    // Pipeline shape (mock backend)
    // =========================================================================

    #[test]
    fn no_width_keeps_original_dimensions() {
        let backend = MockBackend::new(ImageFormat::Jpeg, 2000, 1000);
        let d = transform(&backend, b"orig", &request(None, 60, None)).unwrap();

        assert_eq!(
            d.dimensions,
            Dimensions {
                width: 2000,
                height: 1000
            }
        );
        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Decode(4),
                RecordedOp::Encode {
                    codec: OutputCodec::Jpeg,
                    quality: 60
                },
            ]
        );
    }

    #[test]
    fn width_resizes_preserving_aspect() {
        let backend = MockBackend::new(ImageFormat::Jpeg, 2000, 1000);
        let d = transform(&backend, b"orig", &request(Some(400), 85, None)).unwrap();

        assert_eq!(
            d.dimensions,
            Dimensions {
                width: 400,
                height: 200
            }
        );
        assert!(backend.get_operations().contains(&RecordedOp::Resize {
            width: 400,
            height: 200
        }));
    }

    #[test]
    fn codec_follows_source_format() {
        for (format, codec) in [
            (ImageFormat::Jpeg, OutputCodec::Jpeg),
            (ImageFormat::Png, OutputCodec::Png),
            (ImageFormat::WebP, OutputCodec::Webp),
            (ImageFormat::Gif, OutputCodec::Jpeg),
        ] {
            let backend = MockBackend::new(format, 10, 10);
            let d = transform(&backend, b"x", &request(Some(5), 85, None)).unwrap();
            assert_eq!(d.codec, codec, "{format:?}");
        }
    }

    #[test]
    fn decode_error_propagates() {
        let backend = MockBackend::undecodable();
        let result = transform(&backend, b"text", &request(Some(400), 85, None));
        assert!(matches!(result, Err(BackendError::Decode(_))));
        assert_eq!(backend.encoded_qualities(), Vec::<u32>::new());
    }

    #[test]
    fn oversized_output_refused_before_resize() {
        // 1x1_000_000 strip at w=4096 would need ~4 billion pixels
        let backend = MockBackend::new(ImageFormat::Png, 1, 1_000_000);
        let result = transform(&backend, b"x", &request(Some(4096), 85, None));

        match result {
            Err(BackendError::TooLarge { width, height, .. }) => {
                assert_eq!(width, 4096);
                assert_eq!(height, 4_096_000_000);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode(1)]);
    }

    #[test]
    fn output_at_pixel_budget_is_allowed() {
        let backend = MockBackend::new(ImageFormat::Jpeg, 100, 100);
        let mut req = request(Some(50), 85, None);
        req.max_pixels = 50 * 50;
        let d = transform(&backend, b"x", &req).unwrap();
        assert_eq!(d.dimensions, Dimensions { width: 50, height: 50 });

        req.max_pixels = 50 * 50 - 1;
        assert!(matches!(
            transform(&backend, b"x", &req),
            Err(BackendError::TooLarge { .. })
        ));
    }

    // =========================================================================
    // Quality ladder (mock backend: size = quality * bytes_per_quality)
    // =========================================================================

    #[test]
    fn under_limit_encodes_once() {
        let backend = MockBackend::new(ImageFormat::Jpeg, 100, 100);
        // 85 * 100 = 8500 bytes, limit 10 KB
        let d = transform(&backend, b"x", &request(None, 85, Some(10))).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![85]);
        assert_eq!(d.ladder_attempts, 0);
        assert_eq!(d.quality, Quality(85));
    }

    #[test]
    fn ladder_stops_once_under_limit() {
        let backend = MockBackend::new(ImageFormat::Jpeg, 100, 100);
        // limit 5 KB = 5120: 8500, 7000, 5500 over; 4000 fits
        let d = transform(&backend, b"x", &request(None, 85, Some(5))).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![85, 70, 55, 40]);
        assert_eq!(d.ladder_attempts, 3);
        assert_eq!(d.quality, Quality(40));
        assert_eq!(d.len(), 4000);
    }

    #[test]
    fn ladder_exhausted_returns_last_attempt() {
        let backend =
            MockBackend::new(ImageFormat::Jpeg, 100, 100).with_bytes_per_quality(1000);
        // Even quality 10 is 10_000 bytes, far above 1 KB
        let d = transform(&backend, b"x", &request(Some(50), 85, Some(1))).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![85, 70, 55, 40, 25, 10]);
        assert_eq!(d.ladder_attempts, 5);
        assert_eq!(d.quality, Quality(10));
        assert_eq!(d.len(), 10_000);
    }

    #[test]
    fn ladder_from_low_quality_stops_at_floor() {
        let backend =
            MockBackend::new(ImageFormat::WebP, 100, 100).with_bytes_per_quality(1000);
        let d = transform(&backend, b"x", &request(None, 30, Some(1))).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![30, 15, 10]);
        assert_eq!(d.quality, Quality(10));
    }

    #[test]
    fn lossless_codec_skips_ladder() {
        let backend = MockBackend::new(ImageFormat::Png, 100, 100).with_bytes_per_quality(1000);
        let d = transform(&backend, b"x", &request(None, 85, Some(1))).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![85]);
        assert_eq!(d.ladder_attempts, 0);
    }

    #[test]
    fn no_limit_never_ladders() {
        let backend =
            MockBackend::new(ImageFormat::Jpeg, 100, 100).with_bytes_per_quality(100_000);
        transform(&backend, b"x", &request(None, 85, None)).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![85]);
    }

    // =========================================================================
    // Real backend
    // =========================================================================

    #[test]
    fn real_resize_produces_scaled_jpeg() {
        let original = noisy_jpeg(2000, 1000, 90);
        let d = transform(&RustBackend::new(), &original, &request(Some(400), 85, None)).unwrap();

        assert_eq!(d.codec, OutputCodec::Jpeg);
        let decoded = image::load_from_memory(&d.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 200));
    }

    #[test]
    fn real_pipeline_is_idempotent() {
        let original = noisy_jpeg(300, 200, 90);
        let req = request(Some(150), 70, Some(4));
        let a = transform(&RustBackend::new(), &original, &req).unwrap();
        let b = transform(&RustBackend::new(), &original, &req).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn real_size_bound_is_best_effort() {
        let original = noisy_jpeg(800, 800, 100);
        let req = request(None, 85, Some(20));
        let d = transform(&RustBackend::new(), &original, &req).unwrap();

        let within = d.len() as u64 <= 20 * 1024;
        let exhausted = d.quality == Quality(10);
        assert!(
            within || exhausted,
            "{} bytes at quality {}",
            d.len(),
            d.quality.value()
        );
    }

    #[test]
    fn real_garbage_input_is_decode_error() {
        let result = transform(
            &RustBackend::new(),
            b"not an image at all",
            &request(Some(100), 85, None),
        );
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }
}
