//! Media classification and output codec selection.
//!
//! Two questions get answered here, both without touching the filesystem:
//!
//! - **Is this request for an image at all?** [`classify`] looks only at the
//!   filename extension against fixed allow-lists. Videos and unknown files are
//!   never transformed; they go straight to the static-file layer.
//! - **Which encoder produces the derivative?** [`OutputCodec::for_format`]
//!   maps the format the decoder actually detected (not the extension) to one
//!   of the three codecs we emit. Anything exotic becomes JPEG.
//!
//! | Detected format | Output codec |
//! |---|---|
//! | JPEG | JPEG |
//! | PNG | PNG |
//! | WebP | WebP |
//! | GIF, anything else | JPEG |

use image::ImageFormat;
use serde::Serialize;
use std::fmt;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "heif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "3gp", "mkv"];

/// What kind of media a filename refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

/// Classify a filename by its extension (case-insensitive).
///
/// ```
/// # use diary_media::format::{classify, MediaKind};
/// assert_eq!(classify("1712345678901-123456789.JPG"), MediaKind::Image);
/// assert_eq!(classify("clip.mov"), MediaKind::Video);
/// assert_eq!(classify("notes.txt"), MediaKind::Other);
/// ```
pub fn classify(filename: &str) -> MediaKind {
    let Some(ext) = Path::new(filename).extension().and_then(|e| e.to_str()) else {
        return MediaKind::Other;
    };
    let ext = ext.to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else {
        MediaKind::Other
    }
}

/// Encoder used for a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    Jpeg,
    Png,
    Webp,
}

impl OutputCodec {
    /// Pick the output codec for a decoded source format.
    pub fn for_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::WebP => Self::Webp,
            _ => Self::Jpeg,
        }
    }

    /// Recover the codec of already-encoded bytes from their magic number.
    ///
    /// Used on cache hits, where the key keeps the source extension and says
    /// nothing reliable about how the bytes were encoded.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Whether lowering the encode quality can shrink the output.
    ///
    /// PNG is lossless, so the quality ladder is pointless for it.
    pub fn is_lossy(self) -> bool {
        !matches!(self, Self::Png)
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        };
        f.write_str(name)
    }
}
