//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageDecoder::dimensions` + `orientation` |
//! | **Orient** | `DynamicImage::apply_orientation` |
//! | **Resize** | Lanczos3 `resize_exact`, `crop_imm`, `imageops::overlay` |
//! | **Encode** | JPEG, PNG, lossless WebP, AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a render
//! - **Color**: CSS color parsing for letterbox backgrounds
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
pub mod color;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceInfo};
pub use params::{
    Align, FitMode, OutputFormat, ParamError, Position, Quality, RenderParams, ResizeParams,
};
pub use rust_backend::{RustBackend, supported_input_extensions};
