//! Parameter types for the transform pipeline.
//!
//! These structs describe *what* derivative to produce, not *how*. They sit
//! between the HTTP layer (which only has query strings) and the
//! [`operations`](super::operations) module (which drives the backend).
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`TransformQuery`] — Raw `w` / `q` / `maxSize` query parameters, as strings.
//! - [`RequestLimits`] — Server-side defaults and clamps applied while parsing.
//! - [`TransformRequest`] — A validated request: source filename, width, quality, size ceiling.
//!
//! Query parsing never fails. Garbage in a parameter makes it absent (or
//! default, for quality) so media serving stays resilient to sloppy clients.

use crate::naming::derivative_key;
use serde::Deserialize;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Query parameters as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformQuery {
    pub w: Option<String>,
    pub q: Option<String>,
    #[serde(rename = "maxSize")]
    pub max_size: Option<String>,
}

/// Server-side defaults applied to every parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Quality used when `q` is absent; also the "no transformation" sentinel.
    pub default_quality: Quality,
    /// Requested widths above this are clamped down to it.
    pub max_width: u32,
    /// Resizes producing more pixels than this are refused.
    pub max_pixels: u64,
}

/// 40 megapixels: a 4096-wide output up to roughly 1:2.4 portrait.
pub const DEFAULT_MAX_PIXELS: u64 = 40_000_000;

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            default_quality: Quality::default(),
            max_width: 4096,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// A fully parsed description of the derivative to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub source: String,
    pub width: Option<u32>,
    pub quality: Quality,
    pub max_size_kb: Option<u32>,
    /// Output pixel budget. Not part of the key: it decides whether a
    /// derivative is produced, never what it looks like.
    pub max_pixels: u64,
}

impl TransformRequest {
    /// Parse the raw query for `source`, applying `limits`.
    pub fn from_query(source: &str, query: &TransformQuery, limits: &RequestLimits) -> Self {
        let width = query
            .w
            .as_deref()
            .and_then(parse_positive)
            .map(|w| w.min(limits.max_width));
        let quality = query
            .q
            .as_deref()
            .and_then(parse_quality)
            .unwrap_or(limits.default_quality);
        let max_size_kb = query.max_size.as_deref().and_then(parse_positive);

        Self {
            source: source.to_string(),
            width,
            quality,
            max_size_kb,
            max_pixels: limits.max_pixels,
        }
    }

    /// Whether this request asks for anything other than the original bytes.
    pub fn wants_transform(&self, default_quality: Quality) -> bool {
        self.width.is_some() || self.max_size_kb.is_some() || self.quality != default_quality
    }

    /// Byte ceiling derived from `maxSize` (KB).
    pub fn max_bytes(&self) -> Option<u64> {
        self.max_size_kb.map(|kb| u64::from(kb) * 1024)
    }

    /// Cache key for the derivative this request selects.
    pub fn key(&self) -> String {
        derivative_key(
            &self.source,
            self.width,
            self.quality.value(),
            self.max_size_kb,
        )
    }
}

/// Positive integer, or nothing.
fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|&v| v > 0)
}

/// Integer clamped into the quality range; non-integers are ignored.
fn parse_quality(raw: &str) -> Option<Quality> {
    let value = raw.trim().parse::<i64>().ok()?;
    Some(Quality::new(value.clamp(1, 100) as u32))
}
