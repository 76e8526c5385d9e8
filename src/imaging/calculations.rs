//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Dimensions are `(width, height)` tuples throughout.

use super::params::{Align, FitMode, ResizeParams};

/// Width of the inline blur placeholder raster.
pub const PLACEHOLDER_WIDTH: u32 = 64;

/// `ceil(a * b / c)` in integer arithmetic, so exact ratios never round up
/// through float error.
fn mul_div_ceil(a: u32, b: u32, c: u32) -> u32 {
    let c = c.max(1) as u64;
    (((a as u64) * (b as u64)).div_ceil(c)) as u32
}

fn round_div(value: f64, divisor: f64) -> u32 {
    ((value / divisor).round() as u32).max(1)
}

/// Apply EXIF orientation to raw decoded dimensions.
///
/// Orientations 5-8 are rotated by 90°, so width and height trade places.
/// See <https://www.impulseadventure.com/photo/exif-orientation.html>.
pub fn oriented_dimensions(raw: (u32, u32), orientation: u8) -> (u32, u32) {
    if orientation >= 5 {
        (raw.1, raw.0)
    } else {
        raw
    }
}

/// Compute the display size of the largest derivative for a request.
///
/// # Arguments
/// * `source` - Oriented source dimensions
/// * `width` / `height` - Requested edges (zero is treated as absent)
/// * `fit` - Fit mode, `cover` when absent
/// * `max_width` - Configured ceiling for derivative width
///
/// # Rules
/// - Both edges with `cover`, `fill` or `contain`: exactly the requested box.
/// - `inside` / `outside`: scale factors per axis; the larger factor (inside) or
///   the smaller one (outside) decides which edge stays fixed.
/// - Otherwise: never wider than the source or `max_width`; height is the
///   requested one clamped to the source, or proportional.
pub fn compute_target_size(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: Option<FitMode>,
    max_width: u32,
) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let width = width.filter(|w| *w > 0);
    let height = height.filter(|h| *h > 0);
    let fit = fit.unwrap_or_default();

    if let (Some(w), Some(h)) = (width, height)
        && fit.is_exact_box()
    {
        return (w, h);
    }

    if matches!(fit, FitMode::Inside | FitMode::Outside) {
        let target_w = width.unwrap_or(src_w);
        let target_h = height.unwrap_or(src_h);
        let x_factor = src_w as f64 / target_w as f64;
        let y_factor = src_h as f64 / target_h as f64;

        let width_fixed = match fit {
            FitMode::Inside => x_factor > y_factor,
            _ => x_factor < y_factor,
        };

        return if width_fixed {
            (target_w, round_div(src_h as f64, x_factor))
        } else {
            (round_div(src_w as f64, y_factor), target_h)
        };
    }

    let out_w = width.unwrap_or(src_w).min(max_width.max(1)).min(src_w);
    let out_h = match height {
        Some(h) => h.min(src_h),
        None => mul_div_ceil(src_h, out_w, src_w),
    };
    (out_w, out_h)
}

/// Height of a ladder entry when an explicit height was requested:
/// the target box scaled to `width`, rounded up.
pub fn scaled_height(target: (u32, u32), width: u32) -> u32 {
    mul_div_ceil(target.1, width, target.0)
}

/// Height of the blur placeholder for a derivative of `target` size.
pub fn placeholder_height(target: (u32, u32)) -> u32 {
    let (w, h) = (target.0.max(1), target.1);
    round_div(h as f64 * PLACEHOLDER_WIDTH as f64, w as f64)
}

/// Build the ordered set of derivative widths for a srcset.
///
/// # Arguments
/// * `candidates` - Configured or request-supplied widths (any order)
/// * `target_width` - Width of the largest derivative ([`compute_target_size`])
/// * `explicit` - The request supplied its own ladder; no target insertion, no collapsing
/// * `min_distance` - Minimum pixel gap between neighbouring widths
///
/// Candidates wider than the target are dropped. For implicit ladders the
/// target itself is appended when every survivor is narrower, then any width
/// whose successor is closer than `min_distance` is removed, so the larger of
/// a close pair survives.
pub fn build_width_ladder(
    candidates: &[u32],
    target_width: u32,
    explicit: bool,
    min_distance: u32,
) -> Vec<u32> {
    let mut widths: Vec<u32> = candidates
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= target_width)
        .collect();
    widths.sort_unstable();
    widths.dedup();

    if explicit {
        return widths;
    }

    let max_width = widths.last().copied().unwrap_or(0);
    if target_width > max_width {
        widths.push(target_width);
    }

    widths
        .iter()
        .enumerate()
        .filter(|&(i, &w)| match widths.get(i + 1) {
            Some(&next) => next - w >= min_distance,
            None => true,
        })
        .map(|(_, &w)| w)
        .collect()
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h.max(1) as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Calculate dimensions that fit inside a target area.
///
/// The mirror of [`calculate_fill_dimensions`]: one dimension matches, the
/// other is at most the target.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h.max(1) as f64;

    if src_aspect > tgt_aspect {
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).clamp(1, tgt_h.max(1));
        (w, h)
    } else {
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).clamp(1, tgt_w.max(1));
        (w, h)
    }
}

/// Offset of an anchored box inside `free` pixels of slack.
pub fn anchor_offset(free: u32, align: Align) -> u32 {
    match align {
        Align::Start => 0,
        Align::Middle => free / 2,
        Align::End => free,
    }
}

/// Concrete pixel operation for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Leave the decoded pixels untouched.
    Keep,
    /// Resample to exactly this size.
    Exact { width: u32, height: u32 },
    /// Resample to `scaled`, then crop a `width` × `height` window at `offset`.
    Crop {
        scaled: (u32, u32),
        offset: (u32, u32),
        width: u32,
        height: u32,
    },
    /// Resample to `scaled`, then paste at `offset` on a `width` × `height` canvas.
    Letterbox {
        scaled: (u32, u32),
        offset: (u32, u32),
        width: u32,
        height: u32,
    },
}

/// Decide the pixel operation for `params` against an oriented source.
///
/// Unless upscaling is allowed, a resize only happens when at least one
/// requested edge is no larger than the matching source edge.
pub fn plan_resize(source: (u32, u32), params: &ResizeParams) -> ResizePlan {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let width = params.width.filter(|w| *w > 0);
    let height = params.height.filter(|h| *h > 0);

    let shrinks = width.is_some_and(|w| w <= src_w) || height.is_some_and(|h| h <= src_h);
    if !params.allow_upscale && !shrinks {
        return ResizePlan::Keep;
    }

    let (w, h) = match (width, height) {
        (None, None) => return ResizePlan::Keep,
        (Some(w), None) => {
            return ResizePlan::Exact {
                width: w,
                height: round_div(src_h as f64 * w as f64, src_w as f64),
            };
        }
        (None, Some(h)) => {
            return ResizePlan::Exact {
                width: round_div(src_w as f64 * h as f64, src_h as f64),
                height: h,
            };
        }
        (Some(w), Some(h)) => (w, h),
    };

    let (h_align, v_align) = params.position.alignment();
    match params.fit {
        FitMode::Fill => ResizePlan::Exact {
            width: w,
            height: h,
        },
        FitMode::Inside => {
            let (width, height) = calculate_fit_dimensions((src_w, src_h), (w, h));
            ResizePlan::Exact { width, height }
        }
        FitMode::Outside => {
            let (width, height) = calculate_fill_dimensions((src_w, src_h), (w, h));
            ResizePlan::Exact { width, height }
        }
        FitMode::Cover => {
            let scaled = calculate_fill_dimensions((src_w, src_h), (w, h));
            ResizePlan::Crop {
                scaled,
                offset: (
                    anchor_offset(scaled.0 - w, h_align),
                    anchor_offset(scaled.1 - h, v_align),
                ),
                width: w,
                height: h,
            }
        }
        FitMode::Contain => {
            let scaled = calculate_fit_dimensions((src_w, src_h), (w, h));
            ResizePlan::Letterbox {
                scaled,
                offset: (
                    anchor_offset(w - scaled.0, h_align),
                    anchor_offset(h - scaled.1, v_align),
                ),
                width: w,
                height: h,
            }
        }
    }
}
