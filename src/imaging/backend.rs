//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the opaque codec capability the planner and
//! worker pool depend on: identify a source (dimensions + EXIF orientation)
//! and render it (orient, resize, encode) into one of the supported
//! [`OutputFormat`](super::params::OutputFormat)s.
//!
//! Both operations take the source *bytes*, not a path: the planner has
//! already read the file to hash it, and the worker pool reads it once per
//! item.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on the `image`
//! crate. Tests use the recording `MockBackend` below.

use super::params::RenderParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Result of an identify operation.
///
/// `dimensions` are as stored in the file; `orientation` is the EXIF value
/// (1-8, 1 when absent). Apply
/// [`oriented_dimensions`](super::calculations::oriented_dimensions) to get
/// the displayed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub dimensions: Dimensions,
    pub orientation: u8,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared by every worker in the pool.
pub trait ImageBackend: Sync {
    /// Read dimensions and orientation without decoding pixel data.
    fn identify(&self, bytes: &[u8]) -> Result<SourceInfo, BackendError>;

    /// Decode, correct orientation, resize and encode.
    fn render(&self, bytes: &[u8], params: &RenderParams) -> Result<Vec<u8>, BackendError>;
}
