//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` and, where
//! the CLI prints directly, a `print_*` wrapper. Format functions are pure, no
//! I/O, so the exact output is unit tested.
//!
//! # Output Format
//!
//! ## Plan
//!
//! ```text
//! photos/dawn.jpg (2000x1000, key 3f9a2c1)
//!     480px: /assets/static/dawn.1a2b3c4.9f86d08.jpg
//!     1024px: /assets/static/dawn.5d6e7f8.9f86d08.jpg
//!     2000px: /assets/static/dawn.0a1b2c3.9f86d08.jpg
//!     Sizes: (max-width: 2000px) 100vw, 2000px
//!     Placeholder: 1394 bytes
//! ```
//!
//! ## Build
//!
//! ```text
//! Processing 12 derivatives on 4 threads
//!     [1/12] photos/dawn.jpg → dawn.1a2b3c4.9f86d08.jpg: encoded
//!     [2/12] photos/dawn.jpg → dawn.5d6e7f8.9f86d08.jpg: cached
//!     [3/12] photos/bad.jpg → bad.1a2b3c4.0c3e1aa.jpg: FAILED
//!         could not decode image: ...
//! Derivatives: 1 cached, 10 encoded (12 total), 1 failed
//! ```
//!
//! Item lines arrive in completion order, so the `[n/total]` counter is the
//! item's queue position, not a progress count.

use crate::process::{ItemStatus, ProcessEvent, ProcessReport};
use crate::types::PlanResult;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Plan
// ============================================================================

/// Human-readable summary of one plan.
pub fn format_plan(plan: &PlanResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}x{}, key {})",
        plan.source.rel_path, plan.size.width, plan.size.height, plan.cache_key
    )];

    for spec in &plan.derivatives {
        lines.push(format!("{}{}px: {}", indent(1), spec.width, spec.src));
        if let Some(modern) = &spec.modern_src {
            lines.push(format!("{}{}", indent(2), modern));
        }
    }
    if let Some(sizes) = &plan.sizes {
        lines.push(format!("{}Sizes: {}", indent(1), sizes));
    }
    if let Some(placeholder) = &plan.placeholder {
        lines.push(format!("{}Placeholder: {} bytes", indent(1), placeholder.len()));
    }
    if plan.on_demand {
        lines.push(format!("{}Rendered on demand", indent(1)));
    }
    lines
}

pub fn print_plan(plan: &PlanResult) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format a single worker pool event for display.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total, threads } => {
            let noun = if *total == 1 { "derivative" } else { "derivatives" };
            vec![format!("Processing {} {} on {} threads", total, noun, threads)]
        }
        ProcessEvent::ItemFinished {
            index,
            total,
            source_path,
            file_name,
            status,
        } => {
            let status = match status {
                ItemStatus::Cached => "cached",
                ItemStatus::Encoded => "encoded",
                ItemStatus::Skipped => "skipped",
            };
            vec![format!(
                "{}[{}/{}] {} → {}: {}",
                indent(1),
                index + 1,
                total,
                source_path,
                file_name,
                status
            )]
        }
        ProcessEvent::ItemFailed {
            index,
            total,
            source_path,
            file_name,
            message,
        } => vec![
            format!(
                "{}[{}/{}] {} → {}: FAILED",
                indent(1),
                index + 1,
                total,
                source_path,
                file_name
            ),
            format!("{}{}", indent(2), message),
        ],
    }
}

/// Closing summary of a build, failures listed last.
pub fn format_report(report: &ProcessReport) -> Vec<String> {
    let mut lines = vec![format!("Derivatives: {}", report.stats)];
    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} failed:", report.failures.len()));
        for failure in &report.failures {
            lines.push(format!("{}{}", indent(1), failure));
        }
    }
    lines
}

pub fn print_report(report: &ProcessReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}
