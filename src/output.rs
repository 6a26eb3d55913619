//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines; the matching
//! `print_*` wrapper writes them to stdout. Diagnostics go through `tracing`
//! on stderr instead, so stdout stays a clean run report.
//!
//! # Output Format
//!
//! ```text
//! photo.png
//!     Qualities: 100 66 33 (3 steps)
//!     Color: 0.5, before compression
//!     001/003 q100 color 0.5 (48.2 KiB)
//!     002/003 q66 compress (21.0 KiB)
//!     002 save failed (Permission denied), retry 1 in 50ms
//!     003/003 q33 compress (12.9 KiB)
//! Done! compressions/photo_i3_e1_pre_c0.5.jpg
//!     3 steps, 12.9 KiB
//! ```
//!
//! Long quality curves are shortened to their ends:
//! `100 98 96 … 6 4 2 (50 steps)`.

use crate::crush::Outcome;
use crate::naming::format_color;
use crate::params::RunParameters;
use crate::pipeline::{PipelineEvent, StepKind};

/// Curves up to this length are listed in full.
const FULL_CURVE_LIMIT: usize = 8;
/// Values kept at each end of a shortened curve.
const CURVE_EDGE: usize = 3;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a 1-based step number as 3-digit zero-padded.
fn format_step(index: usize) -> String {
    format!("{:0>3}", index)
}

/// Human-readable byte count, binary units with one decimal.
fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn join_qualities(qualities: &[u8]) -> String {
    qualities
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quality curve summary, shortened in the middle when long.
fn format_curve(qualities: &[u8]) -> String {
    let body = if qualities.len() <= FULL_CURVE_LIMIT {
        join_qualities(qualities)
    } else {
        format!(
            "{} … {}",
            join_qualities(&qualities[..CURVE_EDGE]),
            join_qualities(&qualities[qualities.len() - CURVE_EDGE..])
        )
    };
    match qualities.len() {
        0 => "none".to_string(),
        1 => format!("{} (1 step)", body),
        n => format!("{} ({} steps)", body, n),
    }
}

// ============================================================================
// Run plan
// ============================================================================

/// Format what a run is about to do.
pub fn format_plan(params: &RunParameters, qualities: &[u8]) -> Vec<String> {
    let mut lines = vec![params.input.display().to_string()];
    lines.push(format!("{}Qualities: {}", indent(1), format_curve(qualities)));
    if params.color != 1.0 {
        let when = if params.preprocess {
            "before compression"
        } else {
            "after compression"
        };
        lines.push(format!(
            "{}Color: {}, {}",
            indent(1),
            format_color(params.color),
            when
        ));
    }
    lines
}

pub fn print_plan(params: &RunParameters, qualities: &[u8]) {
    for line in format_plan(params, qualities) {
        println!("{}", line);
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single pipeline progress event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::StepFinished {
            index,
            total,
            quality,
            kind,
            bytes,
        } => {
            let what = match kind {
                StepKind::Compress => "compress".to_string(),
                StepKind::Color { factor } => format!("color {}", format_color(*factor)),
            };
            vec![format!(
                "{}{}/{} q{} {} ({})",
                indent(1),
                format_step(*index),
                format_step(*total),
                quality,
                what,
                format_bytes(*bytes)
            )]
        }
        PipelineEvent::RetryScheduled {
            index,
            attempt,
            wait,
            error,
        } => vec![format!(
            "{}{} save failed ({}), retry {} in {}ms",
            indent(1),
            format_step(*index),
            error,
            attempt,
            wait.as_millis()
        )],
        PipelineEvent::WriteRetryScheduled {
            path,
            attempt,
            wait,
            error,
        } => vec![format!(
            "{}write to {} failed ({}), retry {} in {}ms",
            indent(1),
            path.display(),
            error,
            attempt,
            wait.as_millis()
        )],
    }
}

pub fn print_event(event: &PipelineEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Format how a run ended.
pub fn format_outcome(outcome: &Outcome) -> Vec<String> {
    match outcome {
        Outcome::Declined { path } => {
            vec![format!("Skipped: {} already exists", path.display())]
        }
        Outcome::Written { path, bytes, steps } => vec![
            format!("Done! {}", path.display()),
            format!(
                "{}{} {}, {}",
                indent(1),
                steps,
                if *steps == 1 { "step" } else { "steps" },
                format_bytes(*bytes)
            ),
        ],
    }
}

pub fn print_outcome(outcome: &Outcome) {
    for line in format_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
