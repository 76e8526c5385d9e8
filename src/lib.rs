//! # imgset
//!
//! Responsive image derivatives for static sites. Given a source image and a
//! set of transform options, imgset plans every width a browser may need,
//! names each derivative by its content and options, and encodes them once.
//!
//! # Architecture: Plan, Queue, Process
//!
//! ```text
//! 1. Plan      source + options  →  PlanResult     (src, srcset, sizes, placeholder)
//! 2. Queue     PlanResult        →  QueueItem      (deduplicated per build)
//! 3. Process   QueueItem         →  images_dir/    (cache copy or encode)
//! ```
//!
//! Planning is cheap: it reads the source header and computes names and URLs,
//! so the markup can be written before a single derivative exists. Everything
//! expensive happens in the worker pool, where the cache turns repeat builds
//! into file copies.
//!
//! In `serve` mode planning returns on-demand URLs instead of file URLs and
//! nothing is queued; the dev server calls [`process::render_on_demand`] per
//! request.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`plan`] | Derivative planner: source lookup, width ladder, URLs, srcset, placeholder |
//! | [`queue`] | Deduplicating work queue between planning and processing |
//! | [`process`] | Worker pool: cache check, encode, modern sibling, failure isolation |
//! | [`cache`] | Content hashes, cache keys, atomic cache entries |
//! | [`naming`] | Canonical option order, derivative file names, URL encoding |
//! | [`options`] | Transform options and their query-string form |
//! | [`placeholder`] | Blurred SVG data-URI placeholders |
//! | [`imaging`] | Sizing math and the pure-Rust image backend |
//! | [`config`] | `imgset.toml` loading, merging, validation |
//! | [`types`] | Shared plan and queue types |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Names Are Cache Keys
//!
//! A derivative's file name is `{name}.{options hash}.{content hash}.{ext}`.
//! Any change to the source bytes or the options yields a new name, so output
//! directories and CDN caches never serve a stale file under an old URL, and
//! the derivative cache needs no manifest.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, EXIF orientation, Lanczos3 resampling and encoding all go through
//! the `image` crate. The binary has no system image library dependency.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod options;
pub mod output;
pub mod placeholder;
pub mod plan;
pub mod process;
pub mod queue;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
