//! Shared types passed between the planner, the queue and the worker pool.
//!
//! Planning produces a [`PlanResult`] per embedded image; the build driver
//! feeds it to the [`DerivativeQueue`](crate::queue::DerivativeQueue), which
//! turns each [`DerivativeSpec`] into a [`QueueItem`] for the worker pool.
//! Plan results serialize to JSON for the `plan` command.

use crate::imaging::{Dimensions, OutputFormat};
use crate::options::TransformOptions;
use serde::Serialize;
use std::path::PathBuf;

/// An input file, described once per distinct (path, content) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceImage {
    /// Absolute (or root-joined) path on disk.
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated. Used in cache keys,
    /// on-demand URLs and error messages.
    pub rel_path: String,
    /// SHA-256 hex of the file bytes.
    pub content_hash: String,
    /// Displayed size, after EXIF orientation.
    pub width: u32,
    pub height: u32,
    /// EXIF orientation as stored (1 when absent).
    pub orientation: u8,
    pub format: OutputFormat,
    /// File stem, e.g. `dawn` for `photos/dawn.jpg`.
    pub name: String,
    /// Extension as written in the file name, without the dot.
    pub ext: String,
}

impl SourceImage {
    pub fn size(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Whether a modern-format sibling makes sense for this source.
    pub fn wants_modern_sibling(&self) -> bool {
        self.format != OutputFormat::MODERN
    }
}

/// One planned output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivativeSpec {
    pub width: u32,
    /// Only set when the request asked for an explicit height.
    pub height: Option<u32>,
    pub file_name: String,
    /// Where the worker pool writes the file.
    pub dest_path: PathBuf,
    /// Public URL.
    pub src: String,
    /// URL of the modern-format sibling, when one is produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modern_src: Option<String>,
    pub cache_key: String,
}

/// A `<source>` candidate: one MIME type and its srcset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PictureSource {
    pub mime_type: String,
    pub srcset: Vec<String>,
}

/// Everything a markup renderer needs to embed one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanResult {
    pub source: SourceImage,
    /// The options after background resolution; the basis of the cache key.
    pub options: TransformOptions,
    pub cache_key: String,
    /// Size of the largest derivative.
    pub size: Dimensions,
    /// Ascending by width.
    pub derivatives: Vec<DerivativeSpec>,
    /// URL of the largest derivative, empty when the ladder is empty.
    pub src: String,
    pub srcset: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    /// `data:image/svg+xml,...` blur placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Modern format first, then the source's own type.
    pub sources: Vec<PictureSource>,
    pub class_names: Vec<String>,
    pub lazy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// URLs carry the options as a query string; nothing is precomputed.
    pub on_demand: bool,
}

/// Identity of a queued derivative.
///
/// A struct rather than a concatenated string, so a path ending in hex chars
/// can never collide with a different (path, key) split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey {
    pub dest_path: PathBuf,
    pub cache_key: String,
}

/// The unit of work the worker pool consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub spec: DerivativeSpec,
    pub source: SourceImage,
    /// Request options with width/height overridden to this derivative's.
    pub options: TransformOptions,
    /// Cache entry mirroring `spec.dest_path`, when a cache is configured.
    pub cache_path: Option<PathBuf>,
}

impl QueueItem {
    pub fn key(&self) -> QueueKey {
        QueueKey {
            dest_path: self.spec.dest_path.clone(),
            cache_key: self.spec.cache_key.clone(),
        }
    }
}
