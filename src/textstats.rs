//! Extraction statistics over page text.
//!
//! These feed the advisory quality checks: low text volume, heavy
//! non-alphanumeric content, and repeated lines (header/footer noise).

use std::collections::HashSet;

use crate::models::{ExtractionStats, Page};

/// Compute extraction statistics across all pages of a document.
pub fn extraction_stats(pages: &[Page]) -> ExtractionStats {
    let full_text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let text_length = full_text.chars().count();

    let non_alpha = full_text
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
        .count();
    let non_alpha_ratio = if text_length > 0 {
        non_alpha as f64 / text_length as f64
    } else {
        1.0
    };

    let lines: Vec<&str> = full_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let unique: HashSet<&str> = lines.iter().copied().collect();
    let repeated_line_ratio = if lines.is_empty() {
        0.0
    } else {
        1.0 - unique.len() as f64 / lines.len() as f64
    };

    ExtractionStats {
        text_length,
        page_count: pages.len(),
        non_alpha_ratio: round4(non_alpha_ratio),
        repeated_line_ratio: round4(repeated_line_ratio),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
