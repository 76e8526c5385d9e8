//! Parameter types for image operations.
//!
//! These types describe *what* to render, not *how*. They are the interface
//! between the planner / worker pool (which decide what derivatives exist) and
//! the [`backend`](super::backend) (which does the pixel work), so a mock
//! backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`FitMode`]: How a requested box is reconciled with the source aspect ratio.
//! - [`Position`]: Crop / letterbox anchor used by `cover` and `contain`.
//! - [`OutputFormat`]: The closed set of encodable formats.
//! - [`ResizeParams`] / [`RenderParams`]: Full specification of one render.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A fit or position name outside the supported closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("unknown fit mode '{0}' (expected cover, fill, contain, inside or outside)")]
    UnknownFit(String),
    #[error("unknown position '{0}'")]
    UnknownPosition(String),
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
        Self(75)
    }
}

/// Policy for reconciling a requested width × height with the source aspect ratio.
///
/// - `Cover`: scale to cover the box, crop the overflow at [`Position`].
/// - `Fill`: stretch to exactly the box, ignoring aspect ratio.
/// - `Contain`: scale to fit inside the box, letterbox with the background.
/// - `Inside`: scale to fit inside the box, no letterbox (output may be smaller).
/// - `Outside`: scale to cover the box, no crop (output may be larger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FitMode {
    #[default]
    Cover,
    Fill,
    Contain,
    Inside,
    Outside,
}

impl FitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FitMode::Cover => "cover",
            FitMode::Fill => "fill",
            FitMode::Contain => "contain",
            FitMode::Inside => "inside",
            FitMode::Outside => "outside",
        }
    }

    /// Modes that produce exactly the requested box when both edges are given.
    pub fn is_exact_box(self) -> bool {
        matches!(self, FitMode::Cover | FitMode::Fill | FitMode::Contain)
    }
}

impl FromStr for FitMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "fill" => Ok(FitMode::Fill),
            "contain" => Ok(FitMode::Contain),
            "inside" => Ok(FitMode::Inside),
            "outside" => Ok(FitMode::Outside),
            _ => Err(ParamError::UnknownFit(s.to_string())),
        }
    }
}

impl TryFrom<String> for FitMode {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FitMode> for String {
    fn from(value: FitMode) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anchor for cropping (`cover`) and letterboxing (`contain`).
///
/// Accepts CSS-style names (`left top`, `right`) and compass names
/// (`northwest`, `east`). The canonical form is the CSS-style name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Position {
    #[default]
    Center,
    Top,
    RightTop,
    Right,
    RightBottom,
    Bottom,
    LeftBottom,
    Left,
    LeftTop,
}

/// One axis of an anchor: where the image sits in the free space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Middle,
    End,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Center => "center",
            Position::Top => "top",
            Position::RightTop => "right top",
            Position::Right => "right",
            Position::RightBottom => "right bottom",
            Position::Bottom => "bottom",
            Position::LeftBottom => "left bottom",
            Position::Left => "left",
            Position::LeftTop => "left top",
        }
    }

    /// Horizontal and vertical alignment of this anchor.
    pub fn alignment(self) -> (Align, Align) {
        match self {
            Position::Center => (Align::Middle, Align::Middle),
            Position::Top => (Align::Middle, Align::Start),
            Position::RightTop => (Align::End, Align::Start),
            Position::Right => (Align::End, Align::Middle),
            Position::RightBottom => (Align::End, Align::End),
            Position::Bottom => (Align::Middle, Align::End),
            Position::LeftBottom => (Align::Start, Align::End),
            Position::Left => (Align::Start, Align::Middle),
            Position::LeftTop => (Align::Start, Align::Start),
        }
    }
}

impl FromStr for Position {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        match normalized.as_str() {
            "center" | "centre" => Ok(Position::Center),
            "top" | "north" => Ok(Position::Top),
            "right top" | "top right" | "northeast" => Ok(Position::RightTop),
            "right" | "east" => Ok(Position::Right),
            "right bottom" | "bottom right" | "southeast" => Ok(Position::RightBottom),
            "bottom" | "south" => Ok(Position::Bottom),
            "left bottom" | "bottom left" | "southwest" => Ok(Position::LeftBottom),
            "left" | "west" => Ok(Position::Left),
            "left top" | "top left" | "northwest" => Ok(Position::LeftTop),
            _ => Err(ParamError::UnknownPosition(s.to_string())),
        }
    }
}

impl TryFrom<String> for Position {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Position> for String {
    fn from(value: Position) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output encodings. `Avif` doubles as the modern-format sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    /// The format the modern-format sibling is encoded in.
    pub const MODERN: OutputFormat = OutputFormat::Avif;

    /// Map a file extension (with or without the leading dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            "avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }

    /// Canonical extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }
}

/// Geometry of a render: target edges plus how to reconcile them.
///
/// A missing edge is derived from the source aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub position: Position,
    /// RGBA letterbox color for `contain`; transparent black when absent.
    pub background: Option<[u8; 4]>,
    /// Resize even when the target is larger than the source.
    pub allow_upscale: bool,
}

/// Full specification for decoding, resizing and encoding one image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub resize: ResizeParams,
    pub format: OutputFormat,
    pub quality: Quality,
    /// zlib-style level 0-9, only used for PNG.
    pub png_compression_level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn fit_parses_case_insensitively() {
        assert_eq!("Inside".parse::<FitMode>().unwrap(), FitMode::Inside);
        assert_eq!(" cover ".parse::<FitMode>().unwrap(), FitMode::Cover);
    }

    #[test]
    fn fit_rejects_unknown_name() {
        assert_eq!(
            "stretch".parse::<FitMode>(),
            Err(ParamError::UnknownFit("stretch".into()))
        );
    }

    #[test]
    fn fit_deserializes_through_validation() {
        let fit: FitMode = serde_json::from_str("\"outside\"").unwrap();
        assert_eq!(fit, FitMode::Outside);
        assert!(serde_json::from_str::<FitMode>("\"bogus\"").is_err());
    }

    #[test]
    fn position_accepts_css_and_compass_names() {
        assert_eq!("left top".parse::<Position>().unwrap(), Position::LeftTop);
        assert_eq!("top  left".parse::<Position>().unwrap(), Position::LeftTop);
        assert_eq!("northwest".parse::<Position>().unwrap(), Position::LeftTop);
        assert_eq!("east".parse::<Position>().unwrap(), Position::Right);
        assert!("entropy".parse::<Position>().is_err());
    }

    #[test]
    fn position_canonical_name_roundtrips() {
        for pos in [
            Position::Center,
            Position::Top,
            Position::RightTop,
            Position::Right,
            Position::RightBottom,
            Position::Bottom,
            Position::LeftBottom,
            Position::Left,
            Position::LeftTop,
        ] {
            assert_eq!(pos.as_str().parse::<Position>().unwrap(), pos);
        }
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(OutputFormat::from_extension(".JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("jpeg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("png"), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_extension("gif"), None);
        assert_eq!(OutputFormat::MODERN.mime_type(), "image/avif");
    }
}
