//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `imgset.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `imgset.toml` in the project root. Relative paths inside it are resolved
//! against that root.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! mode = "build"               # "build" precomputes files, "serve" emits query URLs
//!
//! [paths]
//! output_dir = "dist"          # Build output root
//! images_dir = "assets/static" # Derivatives, relative to output_dir
//! cache_dir = ".imgset-cache"  # Durable cache (omit to disable)
//! path_prefix = ""             # Prepended to every public URL
//!
//! [images]
//! extensions = ["jpg", "jpeg", "png", "webp"]
//! widths = [480, 1024, 1920, 2560]
//! max_width = 2560
//! min_size_distance = 300
//! default_blur = 40
//! # background = "#ffffff"
//! quality = 75
//! png_compression_level = 9
//! modern_format = false        # Also write an AVIF sibling per derivative
//!
//! [processing]
//! # max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! fail_fast = false
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::color::is_valid_color;
use crate::imaging::supported_input_extensions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file in the project root.
pub const CONFIG_FILENAME: &str = "imgset.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Whether derivatives are precomputed or produced on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Plans are enqueued and the worker pool writes every derivative.
    #[default]
    Build,
    /// URLs carry the options as a query string; nothing is enqueued.
    Serve,
}

/// Pipeline configuration loaded from `imgset.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub mode: Mode,
    pub paths: PathsConfig,
    pub images: ImagesConfig,
    pub processing: ProcessingConfig,
    /// Project root every relative path resolves against. Set by the loader.
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            paths: PathsConfig::default(),
            images: ImagesConfig::default(),
            processing: ProcessingConfig::default(),
            root: PathBuf::from("."),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let images = &self.images;
        if !(1..=100).contains(&images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if images.png_compression_level > 9 {
            return Err(ConfigError::Validation(
                "images.png_compression_level must be 0-9".into(),
            ));
        }
        if images.widths.is_empty() || images.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "images.widths must be a non-empty list of positive widths".into(),
            ));
        }
        if images.max_width == 0 {
            return Err(ConfigError::Validation(
                "images.max_width must be positive".into(),
            ));
        }
        if images.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "images.extensions must not be empty".into(),
            ));
        }
        let supported = supported_input_extensions();
        if let Some(ext) = images
            .extensions
            .iter()
            .find(|e| !supported.contains(&normalize_extension(e).as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "images.extensions: '{}' cannot be decoded (supported: {})",
                ext,
                supported.join(", ")
            )));
        }
        if let Some(bg) = &images.background
            && !is_valid_color(bg)
        {
            return Err(ConfigError::Validation(format!(
                "images.background: '{}' is not a valid color",
                bg
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Absolute output root.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.paths.output_dir)
    }

    /// Directory derivatives are written to.
    pub fn images_dir(&self) -> PathBuf {
        self.output_dir().join(&self.paths.images_dir)
    }

    /// Durable cache directory, if caching is enabled.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.paths.cache_dir.as_ref().map(|d| self.root.join(d))
    }

    /// Whether `ext` (with or without dot, any case) is on the allow-list.
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.images
            .extensions
            .iter()
            .any(|e| normalize_extension(e) == ext)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Output, image and cache locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Build output root, relative to the project root.
    pub output_dir: String,
    /// Where derivatives land, relative to `output_dir`. Also the URL path.
    pub images_dir: String,
    /// Durable cache mirroring `images_dir`, relative to the project root.
    /// `None` disables the cache.
    pub cache_dir: Option<String>,
    /// Prepended to every public URL (e.g. `/blog` for a sub-path deploy).
    pub path_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: "dist".to_string(),
            images_dir: "assets/static".to_string(),
            cache_dir: Some(".imgset-cache".to_string()),
            path_prefix: String::new(),
        }
    }
}

/// Responsive image generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Source extensions accepted by the planner.
    pub extensions: Vec<String>,
    /// Candidate derivative widths.
    pub widths: Vec<u32>,
    /// Ceiling for derivative width when no explicit box is requested.
    pub max_width: u32,
    /// Neighbouring ladder widths closer than this are collapsed.
    pub min_size_distance: u32,
    /// Placeholder blur radius when the request gives none.
    pub default_blur: u32,
    /// Letterbox color used when a request gives none (or an invalid one).
    pub background: Option<String>,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
    /// PNG compression level (0-9).
    pub png_compression_level: u8,
    /// Write an AVIF sibling next to every derivative.
    pub modern_format: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            widths: vec![480, 1024, 1920, 2560],
            max_width: 2560,
            min_size_distance: 300,
            default_blur: 40,
            background: None,
            quality: 75,
            png_compression_level: 9,
            modern_format: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Stop starting new items after the first failure.
    pub fail_fast: bool,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `imgset.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for the project at `root`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// validates the result and anchors relative paths at `root`.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    let mut config = resolve_config(load_raw_config(root)?)?;
    config.root = root.to_path_buf();
    Ok(config)
}

/// Returns a fully-commented stock `imgset.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgset Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as imgset.toml in the project root. Relative paths are
# resolved against that directory. Unknown keys will cause an error.

# "build" writes every derivative ahead of time.
# "serve" emits URLs that carry the options as a query string instead.
mode = "build"

# ---------------------------------------------------------------------------
# Paths
# ---------------------------------------------------------------------------
[paths]
# Build output root.
output_dir = "dist"

# Where derivatives are written, relative to output_dir. Also the URL path.
images_dir = "assets/static"

# Durable cache of encoded derivatives, kept across builds.
# Comment out to disable caching.
cache_dir = ".imgset-cache"

# Prepended to every public URL, e.g. "/blog" for a sub-path deploy.
path_prefix = ""

# ---------------------------------------------------------------------------
# Responsive images
# ---------------------------------------------------------------------------
[images]
# Source extensions accepted by the planner.
extensions = ["jpg", "jpeg", "png", "webp"]

# Candidate widths for the srcset ladder. Widths above the image's own
# target width are dropped; the target itself is added.
widths = [480, 1024, 1920, 2560]

# Never produce derivatives wider than this unless a box is requested.
max_width = 2560

# Ladder widths closer together than this many pixels are collapsed,
# keeping the larger one.
min_size_distance = 300

# Blur radius of the lazy-load placeholder. 0 disables the blur filter.
default_blur = 40

# Letterbox color for fit = "contain". Any CSS color.
# background = "#ffffff"

# Lossy encoding quality (1 = worst, 100 = best).
quality = 75

# PNG compression level (0 = fastest, 9 = smallest).
png_compression_level = 9

# Also write an AVIF sibling next to every derivative.
modern_format = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Stop starting new images after the first failure. Items already in
# flight still finish; the rest are reported as skipped.
fail_fast = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.mode, Mode::Build);
        assert_eq!(config.images.widths, vec![480, 1024, 1920, 2560]);
        assert_eq!(config.images.max_width, 2560);
        assert_eq!(config.images.min_size_distance, 300);
        assert_eq!(config.images.default_blur, 40);
        assert_eq!(config.images.quality, 75);
        assert_eq!(config.images.png_compression_level, 9);
        assert!(!config.images.modern_format);
        assert!(!config.processing.fail_fast);
        assert_eq!(config.paths.cache_dir.as_deref(), Some(".imgset-cache"));
    }

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
mode = "serve"

[images]
widths = [320, 640]
background = "#fafafa"
"##;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mode, Mode::Serve);
        assert_eq!(config.images.widths, vec![320, 640]);
        assert_eq!(config.images.background.as_deref(), Some("#fafafa"));
        // Default values preserved
        assert_eq!(config.images.quality, 75);
        assert_eq!(config.paths.output_dir, "dist");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("[images]\nsizes = [1]\n");
        assert!(result.is_err());
    }

    #[test]
    fn derived_directories() {
        let config = PipelineConfig {
            root: PathBuf::from("/site"),
            ..Default::default()
        };
        assert_eq!(config.output_dir(), PathBuf::from("/site/dist"));
        assert_eq!(config.images_dir(), PathBuf::from("/site/dist/assets/static"));
        assert_eq!(config.cache_dir(), Some(PathBuf::from("/site/.imgset-cache")));
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let config = PipelineConfig::default();
        assert!(config.is_allowed_extension("JPG"));
        assert!(config.is_allowed_extension(".png"));
        assert!(!config.is_allowed_extension("gif"));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validation_error(config: &PipelineConfig) -> String {
        match config.validate() {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_quality_range() {
        let mut config = PipelineConfig::default();
        config.images.quality = 0;
        assert!(validation_error(&config).contains("quality"));
        config.images.quality = 101;
        assert!(validation_error(&config).contains("quality"));
    }

    #[test]
    fn validate_png_level() {
        let mut config = PipelineConfig::default();
        config.images.png_compression_level = 10;
        assert!(validation_error(&config).contains("png_compression_level"));
    }

    #[test]
    fn validate_widths() {
        let mut config = PipelineConfig::default();
        config.images.widths = vec![];
        assert!(validation_error(&config).contains("widths"));
        config.images.widths = vec![0, 100];
        assert!(validation_error(&config).contains("widths"));
    }

    #[test]
    fn validate_undecodable_extension() {
        let mut config = PipelineConfig::default();
        config.images.extensions.push("tiff".into());
        assert!(validation_error(&config).contains("tiff"));
    }

    #[test]
    fn validate_background_color() {
        let mut config = PipelineConfig::default();
        config.images.background = Some("not-a-color".into());
        assert!(validation_error(&config).contains("background"));
    }

    #[test]
    fn validate_max_processes() {
        let mut config = PipelineConfig::default();
        config.processing.max_processes = Some(0);
        assert!(validation_error(&config).contains("max_processes"));
    }

    // =========================================================================
    // Thread count
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_capped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(100_000),
            fail_fast: false,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
            fail_fast: false,
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge / load
    // =========================================================================

    #[test]
    fn merge_toml_overlays_nested_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.images.widths, vec![480, 1024, 1920, 2560]);
        assert_eq!(config.root, tmp.path());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r##"
[images]
quality = 60
modern_format = true

[processing]
fail_fast = true
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.images.quality, 60);
        assert!(config.images.modern_format);
        assert!(config.processing.fail_fast);
        // Unspecified values should be defaults
        assert_eq!(config.images.max_width, 2560);
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[images]\nquality = 0\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_config_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "not [valid").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.paths, defaults.paths);
        assert_eq!(config.images, defaults.images);
        assert_eq!(config.processing, defaults.processing);
        assert_eq!(config.mode, defaults.mode);
    }
}
