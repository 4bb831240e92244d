//! Filename handling for originals and their derivatives.
//!
//! ## Derivative keys
//!
//! Every derivative lives in the cache directory under a name derived from
//! the original filename and the transform parameters:
//!
//! ```text
//! photo.jpg  ?w=400              → photo-w400-q85-mnull.jpg
//! photo.jpg  ?w=400&maxSize=50   → photo-w400-q85-m50.jpg
//! photo.jpg  ?q=60               → photo-wnull-q60-mnull.jpg
//! ```
//!
//! Absent parameters render as `null`. The original extension is kept so a
//! directory listing of the cache is readable and each entry can be traced
//! back to its source by eye. The scheme is plain concatenation: the three
//! parameter fields are integers, so the trailing `-w…-q…-m…` run is always
//! unambiguous, but nothing stops a source stem from itself looking like a
//! parameter run (see the tests).
//!
//! ## Request filenames
//!
//! [`media_filename`] extracts the filename from a request path and refuses
//! anything that could step outside the originals directory. The path is
//! percent-decoded first, the same way the static file service decodes it,
//! so `a%20b.jpg` names the original `a b.jpg` and an encoded `%2F` is
//! checked as the `/` it stands for.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::path::Path;

/// Build the cache key for a derivative.
///
/// Pure and total: any input produces a key, and equal inputs always
/// produce equal keys.
pub fn derivative_key(
    source_filename: &str,
    width: Option<u32>,
    quality: u32,
    max_size_kb: Option<u32>,
) -> String {
    let path = Path::new(source_filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    format!(
        "{stem}-w{}-q{quality}-m{}{extension}",
        or_null(width),
        or_null(max_size_kb)
    )
}

fn or_null(value: Option<u32>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

/// Extract the requested filename from a request path under `prefix`.
///
/// Returns `None` unless the path is exactly `{prefix}/{filename}` where the
/// filename is a single, non-hidden path component.
///
/// - `"/uploads/123-456.jpg"` → `Some("123-456.jpg")`
/// - `"/uploads/a%20b.jpg"` → `Some("a b.jpg")`
/// - `"/uploads/a/b.jpg"` → `None` (nested)
/// - `"/uploads/../secret.jpg"` → `None`
/// - `"/uploads/..%2Fsecret.jpg"` → `None`
/// - `"/uploads/.cache"` → `None` (hidden)
/// - `"/other/123-456.jpg"` → `None`
pub fn media_filename<'a>(path: &'a str, prefix: &str) -> Option<Cow<'a, str>> {
    let rest = path.strip_prefix(prefix.trim_end_matches('/'))?;
    let name = percent_decode_str(rest.strip_prefix('/')?)
        .decode_utf8()
        .ok()?;
    let rejected = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");
    (!rejected).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // derivative_key
    // =========================================================================

    #[test]
    fn key_for_width_only() {
        assert_eq!(
            derivative_key("photo.jpg", Some(400), 85, None),
            "photo-w400-q85-mnull.jpg"
        );
    }

    #[test]
    fn key_for_all_parameters() {
        assert_eq!(
            derivative_key("1712345678901-987654321.png", Some(800), 70, Some(50)),
            "1712345678901-987654321-w800-q70-m50.png"
        );
    }

    #[test]
    fn key_for_quality_only() {
        assert_eq!(
            derivative_key("photo.webp", None, 60, None),
            "photo-wnull-q60-mnull.webp"
        );
    }

    #[test]
    fn key_is_deterministic() {
        let a = derivative_key("photo.jpg", Some(400), 85, Some(50));
        let b = derivative_key("photo.jpg", Some(400), 85, Some(50));
        assert_eq!(a, b);
    }

    #[test]
    fn key_varies_with_each_field() {
        let base = derivative_key("photo.jpg", Some(400), 85, Some(50));
        assert_ne!(base, derivative_key("other.jpg", Some(400), 85, Some(50)));
        assert_ne!(base, derivative_key("photo.png", Some(400), 85, Some(50)));
        assert_ne!(base, derivative_key("photo.jpg", Some(401), 85, Some(50)));
        assert_ne!(base, derivative_key("photo.jpg", None, 85, Some(50)));
        assert_ne!(base, derivative_key("photo.jpg", Some(400), 84, Some(50)));
        assert_ne!(base, derivative_key("photo.jpg", Some(400), 85, None));
    }

    #[test]
    fn key_preserves_extension_case() {
        assert_eq!(
            derivative_key("IMG.JPG", Some(10), 85, None),
            "IMG-w10-q85-mnull.JPG"
        );
    }

    #[test]
    fn key_without_extension_has_no_trailing_dot() {
        assert_eq!(
            derivative_key("noext", Some(10), 85, None),
            "noext-w10-q85-mnull"
        );
    }

    #[test]
    fn key_keeps_inner_dots_in_stem() {
        assert_eq!(
            derivative_key("a.b.jpg", None, 50, None),
            "a.b-wnull-q50-mnull.jpg"
        );
    }

    #[test]
    fn key_of_parameter_shaped_stem_stays_distinct() {
        // A stem that already looks like a key is still a different key,
        // because the parameter run is always appended after it.
        let plain = derivative_key("photo.jpg", Some(400), 85, None);
        let shaped = derivative_key("photo-w400-q85-mnull.jpg", Some(400), 85, None);
        assert_eq!(shaped, "photo-w400-q85-mnull-w400-q85-mnull.jpg");
        assert_ne!(plain, shaped);
    }

    #[test]
    fn key_of_empty_filename_is_still_a_string() {
        assert_eq!(derivative_key("", None, 85, None), "-wnull-q85-mnull");
    }

    // =========================================================================
    // media_filename
    // =========================================================================

    #[test]
    fn extracts_filename_under_prefix() {
        assert_eq!(
            media_filename("/uploads/123-456.jpg", "/uploads").as_deref(),
            Some("123-456.jpg")
        );
    }

    #[test]
    fn tolerates_trailing_slash_on_prefix() {
        assert_eq!(
            media_filename("/uploads/123-456.jpg", "/uploads/").as_deref(),
            Some("123-456.jpg")
        );
    }

    #[test]
    fn rejects_other_prefixes() {
        assert_eq!(media_filename("/other/a.jpg", "/uploads"), None);
        assert_eq!(media_filename("/uploadsX/a.jpg", "/uploads"), None);
    }

    #[test]
    fn rejects_nested_and_traversal_paths() {
        assert_eq!(media_filename("/uploads/a/b.jpg", "/uploads"), None);
        assert_eq!(media_filename("/uploads/../etc.jpg", "/uploads"), None);
        assert_eq!(media_filename("/uploads/a..b.jpg", "/uploads"), None);
        assert_eq!(media_filename("/uploads/a\\b.jpg", "/uploads"), None);
    }

    #[test]
    fn rejects_hidden_and_empty_names() {
        assert_eq!(media_filename("/uploads/.cache", "/uploads"), None);
        assert_eq!(media_filename("/uploads/", "/uploads"), None);
        assert_eq!(media_filename("/uploads", "/uploads"), None);
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(
            media_filename("/uploads/a%20b.jpg", "/uploads").as_deref(),
            Some("a b.jpg")
        );
        assert_eq!(
            media_filename("/uploads/caf%C3%A9.png", "/uploads").as_deref(),
            Some("café.png")
        );
        // Plain names are borrowed, not copied
        assert!(matches!(
            media_filename("/uploads/photo.jpg", "/uploads"),
            Some(Cow::Borrowed("photo.jpg"))
        ));
    }

    #[test]
    fn checks_decoded_name_not_encoded_one() {
        for path in [
            "/uploads/..%2Fsecret.jpg",
            "/uploads/%2e%2e%2fsecret.jpg",
            "/uploads/a%2Fb.jpg",
            "/uploads/a%5Cb.jpg",
            "/uploads/%2Ehidden.jpg",
            "/uploads/a%00.jpg",
            "/uploads/%FF.jpg",
        ] {
            assert_eq!(media_filename(path, "/uploads"), None, "{path}");
        }
    }
}
