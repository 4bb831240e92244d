//! CLI output formatting.
//!
//! # Output Format
//!
//! ## transform
//!
//! ```text
//! photo.jpg → photo-w400-q85-m50.jpg
//!     Size: 400x200
//!     Codec: jpeg at quality 55 (2 ladder steps)
//!     Bytes: 48213 (limit 51200)
//! ```
//!
//! ## serve
//!
//! ```text
//! Serving /uploads/ on 127.0.0.1:3000
//!     Originals: uploads
//!     Cache: cache
//!     Workers: 8
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::ServerConfig;
use crate::format::OutputCodec;
use crate::imaging::{Derivative, TransformRequest};
use serde::Serialize;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// transform
// ============================================================================

/// Machine-readable summary of a single transform, printed by `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub source: String,
    pub key: String,
    pub codec: OutputCodec,
    pub width: u32,
    pub height: u32,
    pub quality: u32,
    pub ladder_attempts: usize,
    pub bytes: usize,
    /// `None` when no size ceiling was requested.
    pub within_limit: Option<bool>,
}

impl TransformReport {
    pub fn new(request: &TransformRequest, derivative: &Derivative) -> Self {
        Self {
            source: request.source.clone(),
            key: request.key(),
            codec: derivative.codec,
            width: derivative.dimensions.width,
            height: derivative.dimensions.height,
            quality: derivative.quality.value(),
            ladder_attempts: derivative.ladder_attempts,
            bytes: derivative.len(),
            within_limit: request
                .max_bytes()
                .map(|limit| derivative.len() as u64 <= limit),
        }
    }
}

pub fn format_transform_output(
    request: &TransformRequest,
    derivative: &Derivative,
) -> Vec<String> {
    let report = TransformReport::new(request, derivative);
    let mut lines = vec![format!("{} → {}", report.source, report.key)];

    lines.push(format!("{}Size: {}x{}", indent(1), report.width, report.height));

    let codec = match report.ladder_attempts {
        0 => format!("{}Codec: {} at quality {}", indent(1), report.codec, report.quality),
        n => format!(
            "{}Codec: {} at quality {} ({})",
            indent(1),
            report.codec,
            report.quality,
            plural(n, "ladder step")
        ),
    };
    lines.push(codec);

    let bytes = match (request.max_bytes(), report.within_limit) {
        (Some(limit), Some(false)) => {
            format!("{}Bytes: {} (over limit {})", indent(1), report.bytes, limit)
        }
        (Some(limit), _) => format!("{}Bytes: {} (limit {})", indent(1), report.bytes, limit),
        (None, _) => format!("{}Bytes: {}", indent(1), report.bytes),
    };
    lines.push(bytes);

    lines
}

pub fn print_transform_output(request: &TransformRequest, derivative: &Derivative) {
    for line in format_transform_output(request, derivative) {
        println!("{}", line);
    }
}

// ============================================================================
// serve
// ============================================================================

pub fn format_serve_banner(config: &ServerConfig, workers: usize) -> Vec<String> {
    vec![
        format!(
            "Serving {}/ on {}",
            config.server.media_prefix.trim_end_matches('/'),
            config.server.bind
        ),
        format!("{}Originals: {}", indent(1), config.storage.originals_dir.display()),
        format!("{}Cache: {}", indent(1), config.storage.cache_dir.display()),
        format!("{}Workers: {}", indent(1), workers),
    ]
}

pub fn print_serve_banner(config: &ServerConfig, workers: usize) {
    for line in format_serve_banner(config, workers) {
        println!("{}", line);
    }
}
