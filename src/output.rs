//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! Image 42: regenerated (driver: extended, jpg)
//!     Trim: 900x400 (trimmed)
//!     001 thumbnail 150x150 → chair-150x150.jpg
//!     002 medium 300x300 → chair-300x300.jpg (+ webp)
//!     003 square 300x300 → chair-300x300.jpg (same as medium)
//!     Deleted: chair-1024x1024.jpg
//!     Quota: 3 used this period
//! ```
//!
//! Skipped runs print a single line: `Image 42: skipped (quota exceeded)`.
//!
//! ## Quota
//!
//! ```text
//! Period 2024-05: 3 of 100 used, 97 remaining
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure and do no I/O.

use crate::host::ImageId;
use crate::imaging::trim::TrimPath;
use crate::process::{Outcome, Processed, RunReport};
use crate::quota::QuotaUsage;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn trim_label(path: TrimPath) -> &'static str {
    match path {
        TrimPath::Disabled => "disabled",
        TrimPath::Trimmed => "trimmed",
        TrimPath::Fallback => "exact-color fallback",
        TrimPath::Degenerate => "degenerate",
        TrimPath::Failed => "failed",
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_report(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Image {}: regenerated (driver: {}, {})",
        report.image_id,
        report.driver,
        report.format.extension()
    )];

    let trim = report.trim.dimensions;
    lines.push(format!(
        "{}Trim: {}x{} ({})",
        indent(1),
        trim.width,
        trim.height,
        trim_label(report.trim.path)
    ));

    for (i, size) in report.sizes.iter().enumerate() {
        let mut line = format!(
            "{}{} {} {}x{} → {}",
            indent(1),
            format_index(i + 1),
            size.name,
            size.dimensions.width,
            size.dimensions.height,
            size.file
        );
        if let Some(first) = &size.alias_of {
            line.push_str(&format!(" (same as {first})"));
        } else if size.webp.is_some() {
            line.push_str(" (+ webp)");
        }
        lines.push(line);
    }

    if report.sizes.is_empty() {
        lines.push(format!("{}No sizes selected", indent(1)));
    }

    for path in &report.deleted {
        lines.push(format!("{}Deleted: {}", indent(1), file_name(path)));
    }

    if let Some(consumed) = report.quota_consumed {
        lines.push(format!("{}Quota: {} used this period", indent(1), consumed));
    }
    lines
}

/// Format the result of one `process` call.
pub fn format_processed(image_id: ImageId, processed: &Processed) -> Vec<String> {
    let skipped = |reason: &str| vec![format!("Image {image_id}: skipped ({reason})")];
    match &processed.outcome {
        Outcome::Regenerated(report) => format_report(report),
        Outcome::Disabled => skipped("processing disabled"),
        Outcome::QuotaExceeded => skipped("quota exceeded"),
        Outcome::Ineligible => skipped("not eligible"),
        Outcome::Malformed(reason) => skipped(&format!("invalid metadata: {reason}")),
        Outcome::Failed(reason) => vec![format!("Image {image_id}: failed ({reason})")],
    }
}

pub fn print_processed(image_id: ImageId, processed: &Processed) {
    for line in format_processed(image_id, processed) {
        println!("{}", line);
    }
}

/// Format quota usage for the current period.
pub fn format_quota(usage: &QuotaUsage) -> Vec<String> {
    let line = match usage.remaining() {
        Some(remaining) => format!(
            "Period {}: {} of {} used, {} remaining",
            usage.period, usage.consumed, usage.limit, remaining
        ),
        None => format!("Period {}: {} used, unlimited", usage.period, usage.consumed),
    };
    vec![line]
}

pub fn print_quota(usage: &QuotaUsage) {
    for line in format_quota(usage) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::trim::TrimResult;
    use crate::imaging::{Dimensions, Driver, Format};
    use crate::process::SizeOutcome;
    use serde_json::json;
    use std::path::PathBuf;

    fn size(name: &str, file: &str, alias_of: Option<&str>, webp: bool) -> SizeOutcome {
        SizeOutcome {
            name: name.into(),
            dimensions: Dimensions::new(300, 300),
            file: file.into(),
            alias_of: alias_of.map(String::from),
            webp: webp.then(|| PathBuf::from("/up/x.webp")),
        }
    }

    fn processed(outcome: Outcome) -> Processed {
        Processed {
            metadata: json!({}),
            outcome,
        }
    }

    #[test]
    fn regenerated_report_lists_sizes() {
        let report = RunReport {
            image_id: 42,
            driver: Driver::Extended,
            trim: TrimResult {
                dimensions: Dimensions::new(900, 400),
                path: TrimPath::Trimmed,
            },
            format: Format::Jpeg,
            sizes: vec![
                size("medium", "chair-300x300.jpg", None, true),
                size("square", "chair-300x300.jpg", Some("medium"), false),
            ],
            deleted: vec![PathBuf::from("/up/chair-1024x1024.jpg")],
            quota_consumed: Some(3),
        };

        let lines = format_processed(42, &processed(Outcome::Regenerated(report)));
        assert_eq!(
            lines,
            vec![
                "Image 42: regenerated (driver: extended, jpg)",
                "    Trim: 900x400 (trimmed)",
                "    001 medium 300x300 → chair-300x300.jpg (+ webp)",
                "    002 square 300x300 → chair-300x300.jpg (same as medium)",
                "    Deleted: chair-1024x1024.jpg",
                "    Quota: 3 used this period",
            ]
        );
    }

    #[test]
    fn skipped_runs_are_one_line() {
        assert_eq!(
            format_processed(7, &processed(Outcome::QuotaExceeded)),
            vec!["Image 7: skipped (quota exceeded)"]
        );
        assert_eq!(
            format_processed(7, &processed(Outcome::Failed("boom".into()))),
            vec!["Image 7: failed (boom)"]
        );
    }

    #[test]
    fn quota_line_limited_and_unlimited() {
        let usage = QuotaUsage {
            period: "2024-05".into(),
            consumed: 3,
            limit: 100,
        };
        assert_eq!(
            format_quota(&usage),
            vec!["Period 2024-05: 3 of 100 used, 97 remaining"]
        );

        let unlimited = QuotaUsage { limit: 0, ..usage };
        assert_eq!(format_quota(&unlimited), vec!["Period 2024-05: 3 used, unlimited"]);
    }
}
