//! Derivative planning.
//!
//! [`plan`] turns one source image plus a [`TransformOptions`] request into a
//! [`PlanResult`]: the width ladder, a [`DerivativeSpec`] per width with its
//! file name, destination and URL, the cache key, and the markup-ready fields
//! (srcset, sizes, blur placeholder, `<source>` list, class names).
//!
//! Planning reads and hashes the source and renders the tiny placeholder
//! raster; it never writes a file. Writing is the worker pool's job.
//!
//! ## Build vs. serve
//!
//! In [`Mode::Build`] each derivative gets a content-addressed file name under
//! `images_dir` and its URL points there. In [`Mode::Serve`] nothing is
//! precomputed: the URL points at the source path with the canonical options
//! and cache key in the query string, and
//! [`render_on_demand`](crate::process::render_on_demand) answers it.

use crate::cache::{derive_cache_key, hash_bytes};
use crate::config::{Mode, PipelineConfig};
use crate::imaging::calculations::{
    build_width_ladder, compute_target_size, oriented_dimensions, scaled_height,
};
use crate::imaging::color::parse_color;
use crate::imaging::{BackendError, Dimensions, ImageBackend, OutputFormat};
use crate::naming::{
    canonical_options, derive_file_name, encode_uri, join_url, modern_sibling_path, options_query,
};
use crate::options::TransformOptions;
use crate::placeholder::create_placeholder;
use crate::types::{DerivativeSpec, PictureSource, PlanResult, SourceImage};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Base class added to every planned image.
pub const BASE_CLASS: &str = "imgset";
/// Classes marking an image whose real source is not loaded yet.
pub const LAZY_CLASSES: [&str; 2] = ["imgset--lazy", "imgset--before-load"];

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("{ext} is not a supported image format. Supported extensions are {supported}.")]
    UnsupportedFormat { ext: String, supported: String },
    #[error("{0} was not found.")]
    SourceNotFound(PathBuf),
    #[error("Failed to process image {path}. {source}")]
    DecodeFailure {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source file that passed the allow-list and existence checks.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedSource {
    pub path: PathBuf,
    pub rel_path: String,
    pub format: OutputFormat,
    pub ext: String,
}

/// Resolve `source_path` against the config root and check that it is an
/// allowed, existing image.
pub fn locate_source(
    config: &PipelineConfig,
    source_path: &Path,
) -> Result<LocatedSource, PlanError> {
    let path = if source_path.is_absolute() {
        source_path.to_path_buf()
    } else {
        config.root.join(source_path)
    };

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = OutputFormat::from_extension(&ext)
        .filter(|_| config.is_allowed_extension(&ext))
        .ok_or_else(|| PlanError::UnsupportedFormat {
            ext: format!(".{}", ext),
            supported: config.images.extensions.join(", "),
        })?;

    if !path.is_file() {
        return Err(PlanError::SourceNotFound(path));
    }

    Ok(LocatedSource {
        rel_path: relative_path(&config.root, &path),
        path,
        format,
        ext,
    })
}

/// Plan every derivative of `source_path` for `options`.
///
/// A relative `source_path` is resolved against the config root.
pub fn plan(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    source_path: &Path,
    options: &TransformOptions,
) -> Result<PlanResult, PlanError> {
    let LocatedSource {
        path,
        rel_path,
        format,
        ext,
    } = locate_source(config, source_path)?;

    let bytes = std::fs::read(&path)?;
    let content_hash = hash_bytes(&bytes);
    let decode_failure = |source| PlanError::DecodeFailure {
        path: rel_path.clone(),
        source,
    };

    let info = backend.identify(&bytes).map_err(decode_failure)?;
    let (width, height) = oriented_dimensions(info.dimensions.as_tuple(), info.orientation);

    let source = SourceImage {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path,
        rel_path: rel_path.clone(),
        content_hash,
        width,
        height,
        orientation: info.orientation,
        format,
        ext,
    };

    let mut resolved = options
        .clone()
        .resolve_background(config.images.background.as_deref());
    if resolved.quality.is_none() {
        resolved.quality = Some(config.images.quality);
    }

    let target = compute_target_size(
        (width, height),
        resolved.requested_width(),
        resolved.requested_height(),
        resolved.fit,
        config.images.max_width,
    );

    let (candidates, explicit) = match &resolved.widths {
        Some(widths) => (widths.as_slice(), true),
        None => (config.images.widths.as_slice(), false),
    };
    let ladder = build_width_ladder(
        candidates,
        target.0,
        explicit,
        config.images.min_size_distance,
    );

    let cache_key = derive_cache_key(
        &source.rel_path,
        &source.content_hash,
        &canonical_options(&resolved),
    );
    let on_demand = config.mode == Mode::Serve;
    let with_modern = config.images.modern_format && !on_demand && source.wants_modern_sibling();

    let derivatives: Vec<DerivativeSpec> = ladder
        .iter()
        .map(|&w| {
            let h = resolved.requested_height().map(|_| scaled_height(target, w));
            derivative_spec(config, &source, &resolved, &cache_key, w, h, with_modern)
        })
        .collect();

    debug!(
        source = %source.rel_path,
        target = ?target,
        widths = ?ladder,
        key = %cache_key,
        "planned derivatives"
    );

    let src = derivatives
        .last()
        .map(|d| d.src.clone())
        .unwrap_or_default();

    let mut result = PlanResult {
        options: resolved.clone(),
        cache_key,
        size: Dimensions::from(target),
        src,
        srcset: Vec::new(),
        sizes: None,
        placeholder: None,
        sources: Vec::new(),
        class_names: class_names(&resolved),
        lazy: resolved.lazy,
        alt: resolved.alt.clone(),
        on_demand,
        derivatives,
        source,
    };

    if resolved.srcset {
        result.sizes = Some(resolved.sizes.clone().unwrap_or_else(|| {
            format!("(max-width: {}px) 100vw, {}px", target.0, target.0)
        }));
        result.srcset = result
            .derivatives
            .iter()
            .map(|d| format!("{} {}w", d.src, d.width))
            .collect();

        if with_modern {
            result.sources.push(PictureSource {
                mime_type: OutputFormat::MODERN.mime_type().to_string(),
                srcset: result
                    .derivatives
                    .iter()
                    .filter_map(|d| d.modern_src.as_ref().map(|s| format!("{} {}w", s, d.width)))
                    .collect(),
            });
        }
        result.sources.push(PictureSource {
            mime_type: result.source.mime_type().to_string(),
            srcset: result.srcset.clone(),
        });

        let background = resolved.background.as_deref().and_then(parse_color);
        let blur = resolved.blur.unwrap_or(config.images.default_blur);
        let placeholder = create_placeholder(
            backend,
            &bytes,
            &result.source,
            target,
            &resolved,
            background,
            blur,
        )
        .map_err(decode_failure)?;
        result.placeholder = Some(placeholder);
    }

    Ok(result)
}

fn derivative_spec(
    config: &PipelineConfig,
    source: &SourceImage,
    resolved: &TransformOptions,
    cache_key: &str,
    width: u32,
    height: Option<u32>,
    with_modern: bool,
) -> DerivativeSpec {
    let options = resolved.for_derivative(width, height);
    let pairs = canonical_options(&options);
    let file_name = derive_file_name(&source.name, &source.ext, &pairs, &source.content_hash);
    let dest_path = config.images_dir().join(&file_name);
    let prefix = config.paths.path_prefix.as_str();
    let images_dir = config.paths.images_dir.as_str();

    let (src, modern_src) = if config.mode == Mode::Serve {
        let mut query_pairs = pairs;
        query_pairs.push(("key", cache_key.to_string()));
        // The query is already component-encoded; only the path needs escaping
        let url = join_url(&[prefix, images_dir, &source.rel_path]);
        (
            format!("{}?{}", encode_uri(&url), options_query(&query_pairs)),
            None,
        )
    } else {
        let modern = with_modern.then(|| {
            let name = modern_sibling_path(Path::new(&file_name));
            encode_uri(&join_url(&[prefix, images_dir, &name.to_string_lossy()]))
        });
        (encode_uri(&join_url(&[prefix, images_dir, &file_name])), modern)
    };

    DerivativeSpec {
        width,
        height,
        file_name,
        dest_path,
        src,
        modern_src,
        cache_key: cache_key.to_string(),
    }
}

fn class_names(options: &TransformOptions) -> Vec<String> {
    let mut names = options.class_names.clone();
    names.push(BASE_CLASS.to_string());
    if options.lazy && options.srcset {
        names.extend(LAZY_CLASSES.iter().map(|c| c.to_string()));
    }
    names
}

/// `path` relative to `root`, `/`-separated. Falls back to the path itself
/// when it is not under `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
