//! Shared test utilities.
//!
//! Real encoded images for backend tests, and a throwaway project directory
//! whose config root points at a temp dir.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let project = TestProject::new();
//! write_source(project.root(), "photos/dawn.jpg", &jpeg_bytes(800, 600));
//! let plan = plan(&backend, &project.config, Path::new("photos/dawn.jpg"), &opts)?;
//! ```

use crate::config::PipelineConfig;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =========================================================================
// Encoded images
// =========================================================================

/// A gradient JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A gradient PNG with an alpha channel.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, 64, (y % 256) as u8, 255])
    });
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

// =========================================================================
// Project directory
// =========================================================================

/// Temp project with a default config rooted in it.
///
/// The temp dir lives as long as the struct; tweak `config` freely.
pub struct TestProject {
    tmp: TempDir,
    pub config: PipelineConfig,
}

impl TestProject {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig {
            root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        Self { tmp, config }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }
}

/// Write `bytes` to `root/rel`, creating parent directories.
pub fn write_source(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}
