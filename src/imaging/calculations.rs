//! Pure calculation functions for the transform pipeline.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Quality;

/// How much quality drops per re-encode when chasing a size ceiling.
pub const QUALITY_STEP: u32 = 15;

/// Lowest quality the ladder will try.
pub const QUALITY_FLOOR: u32 = 10;

/// Maximum number of re-encodes after the first encode.
pub const MAX_LADDER_ATTEMPTS: usize = 5;

/// Calculate output dimensions for a resize to `target_width`, preserving
/// the source aspect ratio.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target_width` - Requested output width in pixels
///
/// # Returns
/// * `(width, height)` - Height is rounded and never below 1
///
/// # Examples
/// ```
/// # use diary_media::imaging::scale_to_width;
/// // 2000x1000 → 400 wide → 400x200
/// assert_eq!(scale_to_width((2000, 1000), 400), (400, 200));
/// ```
pub fn scale_to_width(source: (u32, u32), target_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let target_width = target_width.max(1);
    if src_w == 0 {
        return (target_width, src_h.max(1));
    }
    let h = (src_h as f64 * target_width as f64 / src_w as f64).round() as u32;
    (target_width, h.max(1))
}

/// The qualities to retry with when an encode exceeds its size ceiling.
///
/// Each step drops by [`QUALITY_STEP`], bottoming out at [`QUALITY_FLOOR`],
/// for at most [`MAX_LADDER_ATTEMPTS`] steps. The ladder stops as soon as it
/// reaches the floor: re-encoding at the same quality cannot shrink the output.
///
/// ```
/// # use diary_media::imaging::{quality_ladder, Quality};
/// let steps: Vec<u32> = quality_ladder(Quality(85)).iter().map(|q| q.value()).collect();
/// assert_eq!(steps, vec![70, 55, 40, 25, 10]);
/// ```
pub fn quality_ladder(start: Quality) -> Vec<Quality> {
    let mut steps = Vec::with_capacity(MAX_LADDER_ATTEMPTS);
    let mut current = start.value();
    while steps.len() < MAX_LADDER_ATTEMPTS && current > QUALITY_FLOOR {
        current = current.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
        steps.push(Quality(current));
    }
    steps
}
