//! Transform options: what a caller asks for when it embeds an image.
//!
//! [`TransformOptions`] carries both the pixel parameters that feed the cache
//! key (width, height, quality, fit, position, background, blur) and the
//! presentation fields that only shape the plan output (width ladder override,
//! `sizes`, class names, alt text, srcset/lazy toggles).
//!
//! Fit and position are closed enums, so an unknown name is rejected when the
//! options are deserialized or parsed from a query string. The background is
//! the one lenient field: an unparseable color is swapped for the configured
//! default by [`TransformOptions::resolve_background`] instead of failing.

use crate::imaging::color::is_valid_color;
use crate::imaging::{FitMode, ParamError, Position};
use crate::naming::decode_uri_component;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum OptionsError {
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("invalid value for '{key}': {value}")]
    InvalidNumber { key: String, value: String },
    #[error("unknown option '{0}'")]
    UnknownKey(String),
    #[error("malformed escape in '{0}'")]
    MalformedEscape(String),
}

/// User-requested parameters for one embedded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<FitMode>,
    pub position: Option<Position>,
    /// CSS color string used for letterboxing.
    pub background: Option<String>,
    /// Placeholder blur radius; `images.default_blur` when absent.
    pub blur: Option<u32>,
    pub quality: Option<u32>,
    /// Explicit width ladder. Used as-is (no target append, no collapsing).
    pub widths: Option<Vec<u32>>,
    /// `sizes` attribute override.
    pub sizes: Option<String>,
    pub class_names: Vec<String>,
    pub alt: Option<String>,
    /// Produce srcset, sizes and placeholder.
    pub srcset: bool,
    pub lazy: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fit: None,
            position: None,
            background: None,
            blur: None,
            quality: None,
            widths: None,
            sizes: None,
            class_names: Vec::new(),
            alt: None,
            srcset: true,
            lazy: true,
        }
    }
}

impl TransformOptions {
    /// Requested width, with zero meaning "not requested".
    pub fn requested_width(&self) -> Option<u32> {
        self.width.filter(|w| *w > 0)
    }

    /// Requested height, with zero meaning "not requested".
    pub fn requested_height(&self) -> Option<u32> {
        self.height.filter(|h| *h > 0)
    }

    /// Replace an invalid or absent background with `default`.
    ///
    /// A valid background is kept as given. When there is no default an
    /// invalid background is dropped.
    pub fn resolve_background(mut self, default: Option<&str>) -> Self {
        let valid = self.background.as_deref().is_some_and(is_valid_color);
        if !valid {
            self.background = default.filter(|d| is_valid_color(d)).map(str::to_string);
        }
        self
    }

    /// The same options targeting one derivative size.
    pub fn for_derivative(&self, width: u32, height: Option<u32>) -> Self {
        Self {
            width: Some(width),
            height,
            ..self.clone()
        }
    }

    /// Parse the query string of an on-demand derivative URL.
    ///
    /// Accepts the keys produced by [`canonical_options`](crate::naming::canonical_options)
    /// plus `key` (the cache key), which is ignored. A leading `?` is allowed.
    pub fn from_query(query: &str) -> Result<Self, OptionsError> {
        let mut options = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for part in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = part.split_once('=').unwrap_or((part, ""));
            let value = decode_uri_component(raw)
                .ok_or_else(|| OptionsError::MalformedEscape(part.to_string()))?;
            match key {
                "width" => options.width = Some(parse_number(key, &value)?),
                "height" => options.height = Some(parse_number(key, &value)?),
                "quality" => options.quality = Some(parse_number(key, &value)?),
                "blur" => options.blur = Some(parse_number(key, &value)?),
                "fit" => options.fit = Some(value.parse()?),
                "position" => options.position = Some(value.parse()?),
                "background" => options.background = Some(value),
                "key" => {}
                other => return Err(OptionsError::UnknownKey(other.to_string())),
            }
        }
        Ok(options)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, OptionsError> {
    value.trim().parse().map_err(|_| OptionsError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{canonical_options, options_query};

    #[test]
    fn defaults_enable_srcset_and_lazy() {
        let opts = TransformOptions::default();
        assert!(opts.srcset);
        assert!(opts.lazy);
        assert_eq!(opts.width, None);
    }

    #[test]
    fn zero_dimensions_are_not_requested() {
        let opts = TransformOptions {
            width: Some(0),
            height: Some(0),
            ..Default::default()
        };
        assert_eq!(opts.requested_width(), None);
        assert_eq!(opts.requested_height(), None);
    }

    #[test]
    fn deserialize_rejects_unknown_fit() {
        let result: Result<TransformOptions, _> = serde_json::from_str(r#"{"fit": "stretch"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn deserialize_partial_options() {
        let opts: TransformOptions =
            serde_json::from_str(r#"{"width": 800, "fit": "inside", "lazy": false}"#).unwrap();
        assert_eq!(opts.width, Some(800));
        assert_eq!(opts.fit, Some(FitMode::Inside));
        assert!(!opts.lazy);
        assert!(opts.srcset);
    }

    // =========================================================================
    // Background resolution
    // =========================================================================

    #[test]
    fn valid_background_is_kept() {
        let opts = TransformOptions {
            background: Some("red".into()),
            ..Default::default()
        }
        .resolve_background(Some("#000"));
        assert_eq!(opts.background.as_deref(), Some("red"));
    }

    #[test]
    fn invalid_background_falls_back_to_default() {
        let opts = TransformOptions {
            background: Some("not-a-color".into()),
            ..Default::default()
        }
        .resolve_background(Some("#000"));
        assert_eq!(opts.background.as_deref(), Some("#000"));
    }

    #[test]
    fn invalid_background_without_default_is_dropped() {
        let opts = TransformOptions {
            background: Some("not-a-color".into()),
            ..Default::default()
        }
        .resolve_background(None);
        assert_eq!(opts.background, None);
    }

    #[test]
    fn absent_background_takes_default() {
        let opts = TransformOptions::default().resolve_background(Some("white"));
        assert_eq!(opts.background.as_deref(), Some("white"));
        assert_eq!(TransformOptions::default().resolve_background(None).background, None);
    }

    #[test]
    fn for_derivative_overrides_size_only() {
        let opts = TransformOptions {
            width: Some(2000),
            fit: Some(FitMode::Contain),
            quality: Some(60),
            ..Default::default()
        };
        let d = opts.for_derivative(480, Some(240));
        assert_eq!(d.width, Some(480));
        assert_eq!(d.height, Some(240));
        assert_eq!(d.fit, Some(FitMode::Contain));
        assert_eq!(d.quality, Some(60));
    }

    // =========================================================================
    // Query parsing
    // =========================================================================

    #[test]
    fn from_query_reads_canonical_keys() {
        let opts = TransformOptions::from_query(
            "?width=480&height=240&quality=60&fit=contain&position=left%20top&background=%23fff&blur=5&key=abc1234",
        )
        .unwrap();
        assert_eq!(opts.width, Some(480));
        assert_eq!(opts.height, Some(240));
        assert_eq!(opts.quality, Some(60));
        assert_eq!(opts.fit, Some(FitMode::Contain));
        assert_eq!(opts.position, Some(Position::LeftTop));
        assert_eq!(opts.background.as_deref(), Some("#fff"));
        assert_eq!(opts.blur, Some(5));
    }

    #[test]
    fn from_query_inverts_canonical_serialization() {
        let opts = TransformOptions {
            width: Some(1024),
            fit: Some(FitMode::Outside),
            position: Some(Position::RightBottom),
            background: Some("rgb(0, 0, 0)".into()),
            ..Default::default()
        };
        let query = options_query(&canonical_options(&opts));
        let parsed = TransformOptions::from_query(&query).unwrap();
        assert_eq!(canonical_options(&parsed), canonical_options(&opts));
    }

    #[test]
    fn from_query_rejects_unknown_key() {
        assert_eq!(
            TransformOptions::from_query("width=10&rotate=90"),
            Err(OptionsError::UnknownKey("rotate".into()))
        );
    }

    #[test]
    fn from_query_rejects_bad_number() {
        assert!(matches!(
            TransformOptions::from_query("width=wide"),
            Err(OptionsError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn from_query_rejects_unknown_fit() {
        assert!(matches!(
            TransformOptions::from_query("fit=squash"),
            Err(OptionsError::Param(ParamError::UnknownFit(_)))
        ));
    }

    #[test]
    fn empty_query_is_default() {
        assert_eq!(
            TransformOptions::from_query("").unwrap(),
            TransformOptions::default()
        );
    }
}
