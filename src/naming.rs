//! Derivative naming: canonical option serialization, file names, and URI encoding.
//!
//! Every derivative is named after *what it is*, not where it came from:
//!
//! ```text
//! {base}.{optionsHash}.{contentHash}.{ext}
//! dawn.3f9a1c2.9b74c9897bac770ffc029102a200c5de...jpg
//! ```
//!
//! - `optionsHash` is the first 7 hex chars of the SHA-256 of the canonical
//!   options query (see [`options_query`]).
//! - `contentHash` is the full SHA-256 of the source bytes.
//!
//! Keeping the two segments separate makes it obvious from a directory listing
//! whether two files differ by options or by source content.
//!
//! ## Canonical option order
//!
//! Options are always serialized in the fixed order width, height, quality,
//! fit, position, background, blur, with absent values omitted. Two requests
//! that differ only in how the caller assembled them therefore produce the
//! same query, the same cache key and the same file name.

use crate::cache::short_hash;
use crate::imaging::OutputFormat;
use crate::options::TransformOptions;
use std::path::{Path, PathBuf};

/// One serialized option: canonical key and its string value.
pub type OptionPair = (&'static str, String);

/// Serialize the cache-relevant subset of `options` in canonical order.
///
/// Zero width/height/blur are treated as absent.
pub fn canonical_options(options: &TransformOptions) -> Vec<OptionPair> {
    let mut pairs = Vec::new();
    if let Some(w) = options.width.filter(|w| *w > 0) {
        pairs.push(("width", w.to_string()));
    }
    if let Some(h) = options.height.filter(|h| *h > 0) {
        pairs.push(("height", h.to_string()));
    }
    if let Some(q) = options.quality {
        pairs.push(("quality", q.to_string()));
    }
    if let Some(fit) = options.fit {
        pairs.push(("fit", fit.to_string()));
    }
    if let Some(position) = options.position {
        pairs.push(("position", position.to_string()));
    }
    if let Some(background) = &options.background {
        pairs.push(("background", background.clone()));
    }
    if let Some(blur) = options.blur.filter(|b| *b > 0) {
        pairs.push(("blur", blur.to_string()));
    }
    pairs
}

/// `key=value&key=value` with every value URI-component encoded.
pub fn options_query(pairs: &[OptionPair]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, encode_uri_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Derivative file name: `{base}.{optionsHash}.{contentHash}.{ext}`.
pub fn derive_file_name(base: &str, ext: &str, pairs: &[OptionPair], content_hash: &str) -> String {
    let options_hash = short_hash(&options_query(pairs));
    format!("{}.{}.{}.{}", base, options_hash, content_hash, ext)
}

/// Path of the modern-format sibling written next to a derivative.
pub fn modern_sibling_path(path: &Path) -> PathBuf {
    path.with_extension(OutputFormat::MODERN.extension())
}

/// Join URL segments with single `/` separators, keeping a leading slash.
pub fn join_url(segments: &[&str]) -> String {
    let joined = segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", joined)
}

// ============================================================================
// URI encoding
// ============================================================================

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&b)
}

fn is_uri_reserved(b: u8) -> bool {
    b";,/?:@&=+$#".contains(&b)
}

fn percent_encode(input: &str, keep: impl Fn(u8) -> bool) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if keep(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}

/// Escape everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub fn encode_uri_component(input: &str) -> String {
    percent_encode(input, is_unreserved)
}

/// Like [`encode_uri_component`] but leaves URI delimiters (`/ ? & = :` ...) intact.
///
/// `%` is escaped like any other byte, so input that already contains escapes
/// gets encoded twice. Apply it to raw paths, never to an encoded query.
pub fn encode_uri(input: &str) -> String {
    percent_encode(input, |b| is_unreserved(b) || is_uri_reserved(b))
}

/// Decode `%XX` escapes (and `+` as space). Returns `None` on a malformed
/// escape or invalid UTF-8.
pub fn decode_uri_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = input.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{FitMode, Position};

    fn options() -> TransformOptions {
        TransformOptions::default()
    }

    // =========================================================================
    // canonical_options
    // =========================================================================

    #[test]
    fn canonical_order_is_fixed() {
        let opts = TransformOptions {
            blur: Some(10),
            background: Some("#fff".into()),
            position: Some(Position::LeftTop),
            fit: Some(FitMode::Contain),
            quality: Some(80),
            height: Some(300),
            width: Some(400),
            ..options()
        };
        let keys: Vec<&str> = canonical_options(&opts).iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["width", "height", "quality", "fit", "position", "background", "blur"]
        );
    }

    #[test]
    fn absent_and_zero_values_are_omitted() {
        let opts = TransformOptions {
            width: Some(0),
            height: None,
            blur: Some(0),
            quality: Some(60),
            ..options()
        };
        assert_eq!(canonical_options(&opts), vec![("quality", "60".to_string())]);
    }

    #[test]
    fn presentation_fields_do_not_affect_serialization() {
        let a = TransformOptions {
            width: Some(480),
            ..options()
        };
        let b = TransformOptions {
            width: Some(480),
            alt: Some("A dog".into()),
            class_names: vec!["hero".into()],
            sizes: Some("50vw".into()),
            lazy: false,
            ..options()
        };
        assert_eq!(canonical_options(&a), canonical_options(&b));
    }

    // =========================================================================
    // options_query / file names
    // =========================================================================

    #[test]
    fn query_encodes_values() {
        let pairs = vec![
            ("width", "480".to_string()),
            ("position", "left top".to_string()),
            ("background", "#fff".to_string()),
        ];
        assert_eq!(
            options_query(&pairs),
            "width=480&position=left%20top&background=%23fff"
        );
    }

    #[test]
    fn empty_query() {
        assert_eq!(options_query(&[]), "");
    }

    #[test]
    fn file_name_shape() {
        let pairs = vec![("width", "480".to_string())];
        let name = derive_file_name("dawn", "jpg", &pairs, "abc123");
        let parts: Vec<&str> = name.split('.').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "dawn");
        assert_eq!(parts[1].len(), 7);
        assert_eq!(parts[2], "abc123");
        assert_eq!(parts[3], "jpg");
    }

    #[test]
    fn file_name_depends_on_options_not_order_of_construction() {
        let a = derive_file_name("x", "png", &[("width", "10".into())], "h");
        let b = derive_file_name("x", "png", &[("width", "10".into())], "h");
        let c = derive_file_name("x", "png", &[("width", "20".into())], "h");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn modern_sibling_swaps_extension() {
        assert_eq!(
            modern_sibling_path(Path::new("out/img/dawn.abc1234.ff.jpg")),
            PathBuf::from("out/img/dawn.abc1234.ff.avif")
        );
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url(&["/", "assets/static/", "a.jpg"]), "/assets/static/a.jpg");
        assert_eq!(join_url(&["/blog/", "/img", "b.png"]), "/blog/img/b.png");
        assert_eq!(join_url(&[""]), "/");
    }

    // =========================================================================
    // URI encoding
    // =========================================================================

    #[test]
    fn encode_component_escapes_delimiters() {
        assert_eq!(encode_uri_component("a b/c?d=e&f"), "a%20b%2Fc%3Fd%3De%26f");
        assert_eq!(encode_uri_component("safe-_.!~*'()"), "safe-_.!~*'()");
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn encode_uri_keeps_delimiters() {
        assert_eq!(
            encode_uri("/img/my photo.jpg?width=480&key=abc"),
            "/img/my%20photo.jpg?width=480&key=abc"
        );
    }

    #[test]
    fn encode_uri_escapes_existing_escapes() {
        assert_eq!(encode_uri("right%20top"), "right%2520top");
    }

    #[test]
    fn decode_reverses_encode() {
        let raw = "left top #fff é";
        assert_eq!(
            decode_uri_component(&encode_uri_component(raw)).as_deref(),
            Some(raw)
        );
    }

    #[test]
    fn decode_rejects_malformed_escape() {
        assert_eq!(decode_uri_component("%zz"), None);
        assert_eq!(decode_uri_component("abc%2"), None);
    }
}
