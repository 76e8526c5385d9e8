//! Blur placeholders for lazy-loaded images.
//!
//! The placeholder is a 64 px wide raster of the source, base64-inlined in an
//! SVG `<image>` sized to the full derivative. When the blur radius is
//! positive the image goes through an `feGaussianBlur` filter, so the browser
//! smooths the upscale. The SVG is then compacted into a `data:` URI that can
//! sit directly in an `src` attribute:
//!
//! ```text
//! data:image/svg+xml,<svg fill='none' viewBox='0 0 1024 683' ...><defs>...</defs><image .../></svg>
//! ```
//!
//! The small raster goes through the same backend render as the real
//! derivatives, so orientation and fit match what eventually loads.

use crate::cache::short_hash;
use crate::imaging::calculations::{PLACEHOLDER_WIDTH, placeholder_height};
use crate::imaging::{BackendError, ImageBackend, Quality, RenderParams, ResizeParams};
use crate::options::TransformOptions;
use crate::types::SourceImage;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Render the placeholder raster and wrap it into a data URI.
///
/// `target` is the displayed size of the largest derivative.
pub fn create_placeholder(
    backend: &impl ImageBackend,
    bytes: &[u8],
    source: &SourceImage,
    target: (u32, u32),
    options: &TransformOptions,
    background: Option<[u8; 4]>,
    blur: u32,
) -> Result<String, BackendError> {
    let params = RenderParams {
        resize: ResizeParams {
            width: Some(PLACEHOLDER_WIDTH),
            height: Some(placeholder_height(target)),
            fit: options.fit.unwrap_or_default(),
            position: options.position.unwrap_or_default(),
            background,
            allow_upscale: true,
        },
        format: source.format,
        quality: Quality::default(),
        png_compression_level: 9,
    };
    let raster = backend.render(bytes, &params)?;
    let base64 = STANDARD.encode(&raster);

    let svg = wrap_svg(target, &blur_svg(source.mime_type(), &base64, target, blur));
    Ok(svg_data_uri(&svg))
}

/// The `<defs>` + `<image>` body of the placeholder.
///
/// The filter is omitted entirely when `blur` is zero.
pub fn blur_svg(mime_type: &str, base64: &str, size: (u32, u32), blur: u32) -> String {
    let (width, height) = size;
    let href = format!("data:{};base64,{}", mime_type, base64);

    if blur == 0 {
        return format!(
            r#"<image x="0" y="0" width="{width}" height="{height}" xlink:href="{href}" />"#
        );
    }

    let id = format!("__svg-blur-{}", short_hash(base64));
    format!(
        concat!(
            r#"<defs><filter id="{id}"><feGaussianBlur in="SourceGraphic" stdDeviation="{blur}"/></filter></defs>"#,
            r#"<image x="0" y="0" filter="url(#{id})" width="{width}" height="{height}" xlink:href="{href}" />"#,
        ),
        id = id,
        blur = blur,
        width = width,
        height = height,
        href = href,
    )
}

/// Outer `<svg>` element sized to the derivative.
pub fn wrap_svg(size: (u32, u32), body: &str) -> String {
    format!(
        r#"<svg fill="none" viewBox="0 0 {} {}" xmlns="{}" xmlns:xlink="{}">{}</svg>"#,
        size.0, size.1, SVG_NS, XLINK_NS, body
    )
}

/// Compact SVG data URI.
///
/// Whitespace runs collapse to one space and double quotes become single
/// quotes. The result is URI-component encoded, then the escapes browsers
/// accept raw (space, `=`, `:`, `/`) are restored and the rest lowercased.
pub fn svg_data_uri(svg: &str) -> String {
    let collapsed = svg.split_whitespace().collect::<Vec<_>>().join(" ");
    let quoted = collapsed.replace('"', "'");
    let encoded = crate::naming::encode_uri_component(&quoted);

    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded.as_str();
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escape = &rest[pos..pos + 3];
        match escape {
            "%20" => out.push(' '),
            "%3D" => out.push('='),
            "%3A" => out.push(':'),
            "%2F" => out.push('/'),
            other => out.push_str(&other.to_ascii_lowercase()),
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);

    format!("data:image/svg+xml,{}", out)
}
