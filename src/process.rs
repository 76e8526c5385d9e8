//! Derivative processing: the worker pool.
//!
//! Takes the drained [`QueueItem`]s and turns each one into an encoded file
//! under `images_dir`, on a dedicated rayon pool.
//!
//! ## Per-item steps
//!
//! 1. **Cache check.** When the item has a cache path and the entry is present
//!    (non-empty), copy it to the destination and stop. With the modern format
//!    enabled, both the primary and the AVIF sibling entry must be present;
//!    otherwise the item is re-encoded in full.
//! 2. **Encode.** Read the source, render it with the item's own options
//!    (orientation, fit, position, background, quality; never upscaled), write
//!    the destination atomically, then mirror it into the cache.
//! 3. **Modern sibling.** When enabled and the source is not already AVIF,
//!    render again as AVIF and write it next to the primary (and cache it).
//!
//! Cache problems are logged and counted but never fail an item; caching is
//! an optimization.
//!
//! ## Failure policy
//!
//! Failures are isolated: a broken source fails its own item, wrapped with the
//! project-relative path, and every other item still runs. All failures are
//! collected into [`ProcessReport::failures`]. With `processing.fail_fast`,
//! items that have not started when the first failure lands are skipped
//! instead (items already running still finish).
//!
//! ## Parallel Processing
//!
//! Items run on a pool of `concurrency` threads, one item per task
//! (`with_max_len(1)`), so a worker that finishes takes the next pending item
//! immediately. Progress is reported as [`ProcessEvent`]s over an optional
//! channel; see [`output::format_process_event`](crate::output::format_process_event).

use crate::cache::{CacheStats, copy_cached, is_cached, write_atomic};
use crate::config::{PipelineConfig, effective_threads};
use crate::imaging::color::parse_color;
use crate::imaging::{
    BackendError, ImageBackend, OutputFormat, Quality, RenderParams, ResizeParams,
};
use crate::naming::modern_sibling_path;
use crate::options::{OptionsError, TransformOptions};
use crate::plan::{PlanError, locate_source};
use crate::types::QueueItem;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a single item failed.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("could not read source: {0}")]
    Read(#[source] std::io::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A failed item, with the source path relative to the project root.
#[derive(Error, Debug)]
#[error("Failed to process image {source_path}. {error}")]
pub struct ItemFailure {
    pub source_path: String,
    pub dest_path: PathBuf,
    #[source]
    pub error: ItemError,
}

/// How an item was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Copied from the cache.
    Cached,
    /// Rendered by the backend.
    Encoded,
    /// Not started because of fail-fast.
    Skipped,
}

/// Progress events, sent as items complete (in completion order).
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Started {
        total: usize,
        threads: usize,
    },
    ItemFinished {
        index: usize,
        total: usize,
        source_path: String,
        file_name: String,
        status: ItemStatus,
    },
    ItemFailed {
        index: usize,
        total: usize,
        source_path: String,
        file_name: String,
        message: String,
    },
}

/// Result of one pool run.
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub stats: CacheStats,
    pub failures: Vec<ItemFailure>,
}

impl ProcessReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Outcome {
    Done(ItemStatus),
    Failed(ItemFailure),
}

/// Runs queue items through a backend under bounded concurrency.
pub struct WorkerPool<'a, B: ImageBackend> {
    backend: &'a B,
    config: &'a PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
}

impl<'a, B: ImageBackend> WorkerPool<'a, B> {
    pub fn new(backend: &'a B, config: &'a PipelineConfig) -> Self {
        Self {
            backend,
            config,
            events: None,
        }
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: Sender<ProcessEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Process every item.
    ///
    /// `concurrency` defaults to [`effective_threads`]. Per-item failures are
    /// in the report; only failing to start the pool is an `Err`.
    pub fn run(
        &self,
        items: Vec<QueueItem>,
        concurrency: Option<usize>,
    ) -> Result<ProcessReport, ProcessError> {
        let threads = concurrency
            .unwrap_or_else(|| effective_threads(&self.config.processing))
            .max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("imgset-worker-{i}"))
            .build()?;

        let total = items.len();
        self.emit(ProcessEvent::Started { total, threads });

        let abort = AtomicBool::new(false);
        let results: Vec<(Outcome, u32)> = pool.install(|| {
            items
                .par_iter()
                .with_max_len(1)
                .enumerate()
                .map(|(index, item)| self.process_item(index, total, item, &abort))
                .collect()
        });

        let mut report = ProcessReport::default();
        for (outcome, cache_errors) in results {
            report.stats.cache_errors += cache_errors;
            match outcome {
                Outcome::Done(ItemStatus::Cached) => report.stats.hits += 1,
                Outcome::Done(ItemStatus::Encoded) => report.stats.encoded += 1,
                Outcome::Done(ItemStatus::Skipped) => report.stats.skipped += 1,
                Outcome::Failed(failure) => {
                    report.stats.failed += 1;
                    report.failures.push(failure);
                }
            }
        }
        Ok(report)
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }

    fn process_item(
        &self,
        index: usize,
        total: usize,
        item: &QueueItem,
        abort: &AtomicBool,
    ) -> (Outcome, u32) {
        let finished = |status| ProcessEvent::ItemFinished {
            index,
            total,
            source_path: item.source.rel_path.clone(),
            file_name: item.spec.file_name.clone(),
            status,
        };

        if abort.load(Ordering::SeqCst) {
            self.emit(finished(ItemStatus::Skipped));
            return (Outcome::Done(ItemStatus::Skipped), 0);
        }

        let mut cache_errors = 0;
        let outcome = match self.process_one(item, &mut cache_errors) {
            Ok(status) => {
                self.emit(finished(status));
                Outcome::Done(status)
            }
            Err(error) => {
                if self.config.processing.fail_fast {
                    abort.store(true, Ordering::SeqCst);
                }
                let failure = ItemFailure {
                    source_path: item.source.rel_path.clone(),
                    dest_path: item.spec.dest_path.clone(),
                    error,
                };
                warn!("{}", failure);
                self.emit(ProcessEvent::ItemFailed {
                    index,
                    total,
                    source_path: failure.source_path.clone(),
                    file_name: item.spec.file_name.clone(),
                    message: failure.error.to_string(),
                });
                Outcome::Failed(failure)
            }
        };
        (outcome, cache_errors)
    }

    fn process_one(&self, item: &QueueItem, cache_errors: &mut u32) -> Result<ItemStatus, ItemError> {
        let with_modern =
            self.config.images.modern_format && item.source.wants_modern_sibling();

        if let Some(cache_path) = &item.cache_path {
            match restore_from_cache(cache_path, &item.spec.dest_path, with_modern) {
                Ok(true) => {
                    debug!(file = %item.spec.file_name, "cache hit");
                    return Ok(ItemStatus::Cached);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        cache = %cache_path.display(),
                        "cache read failed, re-encoding: {}", e
                    );
                    *cache_errors += 1;
                }
            }
        }

        let bytes = std::fs::read(&item.source.path).map_err(ItemError::Read)?;
        let params = render_params(self.config, &item.options, item.source.format);

        let encoded = self.backend.render(&bytes, &params)?;
        write_output(&item.spec.dest_path, item.cache_path.as_deref(), &encoded, cache_errors)?;

        if with_modern {
            let modern_params = RenderParams {
                format: OutputFormat::MODERN,
                ..params
            };
            let modern = self.backend.render(&bytes, &modern_params)?;
            let cache_path = item.cache_path.as_deref().map(modern_sibling_path);
            write_output(
                &modern_sibling_path(&item.spec.dest_path),
                cache_path.as_deref(),
                &modern,
                cache_errors,
            )?;
        }

        debug!(file = %item.spec.file_name, "encoded");
        Ok(ItemStatus::Encoded)
    }
}

/// Copy cache entries to the destination. `Ok(false)` on a miss.
fn restore_from_cache(cache_path: &Path, dest: &Path, with_modern: bool) -> std::io::Result<bool> {
    if with_modern {
        let modern_cache = modern_sibling_path(cache_path);
        if !(is_cached(cache_path) && is_cached(&modern_cache)) {
            return Ok(false);
        }
        let copied = copy_cached(&modern_cache, &modern_sibling_path(dest))?
            && copy_cached(cache_path, dest)?;
        return Ok(copied);
    }
    copy_cached(cache_path, dest)
}

/// Write the destination (fatal on error) and mirror it into the cache
/// (logged and counted on error).
fn write_output(
    dest: &Path,
    cache_path: Option<&Path>,
    bytes: &[u8],
    cache_errors: &mut u32,
) -> Result<(), ItemError> {
    write_atomic(dest, bytes).map_err(|source| ItemError::Write {
        path: dest.to_path_buf(),
        source,
    })?;
    if let Some(cache_path) = cache_path
        && let Err(e) = write_atomic(cache_path, bytes)
    {
        warn!(cache = %cache_path.display(), "cache write failed: {}", e);
        *cache_errors += 1;
    }
    Ok(())
}

/// Render parameters for one derivative, re-derived from its options.
///
/// The background falls back to the configured default when the option is
/// missing or unparseable; quality falls back to `images.quality`.
pub fn render_params(
    config: &PipelineConfig,
    options: &TransformOptions,
    format: OutputFormat,
) -> RenderParams {
    let background = options
        .background
        .as_deref()
        .and_then(parse_color)
        .or_else(|| config.images.background.as_deref().and_then(parse_color));
    RenderParams {
        resize: ResizeParams {
            width: options.requested_width(),
            height: options.requested_height(),
            fit: options.fit.unwrap_or_default(),
            position: options.position.unwrap_or_default(),
            background,
            allow_upscale: false,
        },
        format,
        quality: Quality::new(options.quality.unwrap_or(config.images.quality)),
        png_compression_level: config.images.png_compression_level,
    }
}

/// Errors from [`render_on_demand`].
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Source(#[from] PlanError),
    #[error(transparent)]
    Failed(#[from] ItemFailure),
}

/// Serve-mode rendering: produce one derivative for a source path and the
/// query string of its on-demand URL.
///
/// Nothing is queued or cached. Returns the encoded bytes and their format.
pub fn render_on_demand(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    source_path: &Path,
    query: &str,
) -> Result<(Vec<u8>, OutputFormat), RenderError> {
    let options = TransformOptions::from_query(query)?
        .resolve_background(config.images.background.as_deref());
    let source = locate_source(config, source_path)?;

    let failed = |error| ItemFailure {
        source_path: source.rel_path.clone(),
        dest_path: PathBuf::new(),
        error,
    };
    let bytes = std::fs::read(&source.path)
        .map_err(ItemError::Read)
        .map_err(failed)?;
    let params = render_params(config, &options, source.format);
    let encoded = backend
        .render(&bytes, &params)
        .map_err(ItemError::from)
        .map_err(failed)?;
    Ok((encoded, source.format))
}
