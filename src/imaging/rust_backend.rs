//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3`, geometry from [`plan_resize`] |
//! | Crop / letterbox | `crop_imm` / `imageops::overlay` on a background canvas |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality` (level 0-9 → fast/default/best) |
//! | Encode → WebP | `WebPEncoder::new_lossless` (the `image` crate has no lossy WebP) |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
use super::calculations::{ResizePlan, plan_resize};
use super::params::{OutputFormat, RenderParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// AVIF encoder speed: 1 (slowest, smallest) to 10 (fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(e: image::ImageError) -> BackendError {
    BackendError::Decode(e.to_string())
}

fn decoder(bytes: &[u8]) -> Result<impl ImageDecoder + '_, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .into_decoder()
        .map_err(decode_error)
}

/// EXIF orientation value (1-8) for a decoded orientation.
fn exif_orientation(orientation: Orientation) -> u8 {
    match orientation {
        Orientation::NoTransforms => 1,
        Orientation::FlipHorizontal => 2,
        Orientation::Rotate180 => 3,
        Orientation::FlipVertical => 4,
        Orientation::Rotate90FlipH => 5,
        Orientation::Rotate90 => 6,
        Orientation::Rotate270FlipH => 7,
        Orientation::Rotate270 => 8,
    }
}

/// Decode and rotate/flip per the EXIF orientation tag.
fn load_oriented(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let mut decoder = decoder(bytes)?;
    // A malformed EXIF block is not worth failing the image over
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Execute a [`ResizePlan`] on decoded pixels.
fn apply_resize(img: DynamicImage, plan: ResizePlan, background: [u8; 4]) -> DynamicImage {
    match plan {
        ResizePlan::Keep => img,
        ResizePlan::Exact { width, height } => img.resize_exact(width, height, FilterType::Lanczos3),
        ResizePlan::Crop {
            scaled,
            offset,
            width,
            height,
        } => img
            .resize_exact(scaled.0, scaled.1, FilterType::Lanczos3)
            .crop_imm(offset.0, offset.1, width, height),
        ResizePlan::Letterbox {
            scaled,
            offset,
            width,
            height,
        } => {
            let resized = img
                .resize_exact(scaled.0, scaled.1, FilterType::Lanczos3)
                .to_rgba8();
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba(background));
            image::imageops::overlay(&mut canvas, &resized, offset.0 as i64, offset.1 as i64);
            DynamicImage::ImageRgba8(canvas)
        }
    }
}

/// Normalize to 8-bit RGB(A), the common denominator of every encoder below.
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode to the requested format with format-specific compression settings.
///
/// - JPEG: baseline, `quality`.
/// - PNG: `png_compression_level` mapped onto the encoder's three levels, no filter.
/// - WebP: lossless, the only WebP encoder `image` provides. `quality` is
///   ignored, so two qualities yield identical bytes under different names, and
///   a derivative can come out larger than a lossy source.
/// - AVIF: speed 6, `quality`.
fn encode(img: &DynamicImage, params: &RenderParams) -> Result<Vec<u8>, BackendError> {
    let quality = params.quality.value().clamp(1, 100) as u8;
    let mut buf = Vec::new();
    let result = match params.format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        OutputFormat::Png => to_8bit(img).write_with_encoder(PngEncoder::new_with_quality(
            &mut buf,
            png_compression(params.png_compression_level),
            PngFilter::NoFilter,
        )),
        OutputFormat::WebP => to_8bit(img).write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        OutputFormat::Avif => to_8bit(img).write_with_encoder(
            AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality),
        ),
    };
    result.map_err(|e| {
        BackendError::Encode(format!("{} encode failed: {}", params.format.extension(), e))
    })?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<SourceInfo, BackendError> {
        let mut decoder = decoder(bytes)?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder
            .orientation()
            .map(exif_orientation)
            .unwrap_or(1);
        Ok(SourceInfo {
            dimensions: Dimensions { width, height },
            orientation,
        })
    }

    fn render(&self, bytes: &[u8], params: &RenderParams) -> Result<Vec<u8>, BackendError> {
        let img = load_oriented(bytes)?;
        let plan = plan_resize((img.width(), img.height()), &params.resize);
        let background = params.resize.background.unwrap_or([0, 0, 0, 0]);
        let resized = apply_resize(img, plan, background);
        encode(&resized, params)
    }
}
