//! Document quality checks: duplicate detection and advisory heuristics.
//!
//! Every check is an independent function returning zero or one
//! [`Finding`]. Findings are advisory data folded into the
//! [`QualityReport`]; they are never raised as errors. Near-duplicate
//! detection deliberately scans only a bounded window of the tenant's most
//! recent files, trading completeness for bounded cost.

use serde_json::json;
use tracing::info;

use crate::catalog::FileCatalog;
use crate::classify;
use crate::error::Result;
use crate::models::{
    ExtractionStats, FileEntry, Finding, NormalizationStats, QualityReport, Severity,
};
use crate::readiness;
use crate::simhash;

/// Tuning knobs for the quality checks. Defaults match the platform's
/// standing configuration; all are exposed for tuning.
#[derive(Debug, Clone)]
pub struct QualityOptions {
    /// Maximum Hamming distance treated as a near duplicate.
    pub near_distance_max: u32,
    /// How many of the tenant's most recent files to compare against.
    pub recent_window: usize,
    /// Minimum extracted text length before LOW_TEXT_VOLUME fires.
    pub min_text_length: usize,
    /// Non-alphanumeric ratio above which HIGH_NON_ALPHA_RATIO fires.
    pub max_non_alpha_ratio: f64,
    /// Repeated-line ratio above which REPEATED_LINES fires.
    pub max_repeated_line_ratio: f64,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            near_distance_max: 3,
            recent_window: 50,
            min_text_length: 300,
            max_non_alpha_ratio: 0.5,
            max_repeated_line_ratio: 0.4,
        }
    }
}

/// Everything a quality run needs to know about one document.
pub struct QualityContext<'a> {
    pub tenant_id: &'a str,
    pub dataset_id: &'a str,
    pub file_id: &'a str,
    pub filename: &'a str,
    /// Cleaned full text of the document.
    pub cleaned_text: &'a str,
    /// SHA-256 of the raw uploaded bytes, when known.
    pub raw_sha256: Option<&'a str>,
    pub extraction: &'a ExtractionStats,
    pub normalization: &'a NormalizationStats,
}

/// Exact duplicates: any other tenant file sharing the raw content hash.
pub async fn check_exact_duplicate(
    catalog: &dyn FileCatalog,
    ctx: &QualityContext<'_>,
) -> Result<Option<Finding>> {
    let Some(raw_sha256) = ctx.raw_sha256 else {
        return Ok(None);
    };
    let matches: Vec<String> = catalog
        .find_by_content_hash(ctx.tenant_id, raw_sha256)
        .await?
        .into_iter()
        .filter(|entry| entry.file_id != ctx.file_id)
        .map(|entry| entry.file_id)
        .collect();
    if matches.is_empty() {
        return Ok(None);
    }
    Ok(Some(Finding::new(
        "EXACT_DUPLICATE",
        Severity::Critical,
        "Exact duplicate detected based on raw file hash.",
        json!({ "matchingFileIds": matches }),
        "Remove duplicates or keep the most complete copy.",
    )))
}

/// Near duplicates: fingerprint distance ≤ threshold against the recent
/// window. Lists at most 5 matches.
pub fn check_near_duplicates(
    fingerprint: u64,
    recent: &[FileEntry],
    ctx: &QualityContext<'_>,
    opts: &QualityOptions,
) -> Option<Finding> {
    let mut matches = Vec::new();
    for entry in recent {
        if entry.file_id == ctx.file_id {
            continue;
        }
        let Some(other) = entry.simhash else {
            continue;
        };
        let distance = simhash::distance(fingerprint, other);
        if distance <= opts.near_distance_max {
            matches.push(json!({ "fileId": entry.file_id, "distance": distance }));
        }
    }
    if matches.is_empty() {
        return None;
    }
    matches.truncate(5);
    Some(Finding::new(
        "NEAR_DUPLICATE",
        Severity::Warn,
        "Near duplicate detected based on text fingerprint.",
        json!({ "matches": matches }),
        "Review similar files to reduce redundancy.",
    ))
}

pub fn check_text_volume(stats: &ExtractionStats, opts: &QualityOptions) -> Option<Finding> {
    if stats.text_length >= opts.min_text_length {
        return None;
    }
    Some(Finding::new(
        "LOW_TEXT_VOLUME",
        Severity::Warn,
        "Extracted text is very short.",
        json!({ "textLength": stats.text_length }),
        "Verify the PDF has selectable text or re-export it.",
    ))
}

pub fn check_non_alpha_ratio(stats: &ExtractionStats, opts: &QualityOptions) -> Option<Finding> {
    if stats.non_alpha_ratio <= opts.max_non_alpha_ratio {
        return None;
    }
    Some(Finding::new(
        "HIGH_NON_ALPHA_RATIO",
        Severity::Warn,
        "Extracted text contains a high ratio of non-alphanumeric characters.",
        json!({ "nonAlphaRatio": stats.non_alpha_ratio }),
        "Clean formatting artifacts or re-export the PDF.",
    ))
}

pub fn check_repeated_lines(stats: &ExtractionStats, opts: &QualityOptions) -> Option<Finding> {
    if stats.repeated_line_ratio <= opts.max_repeated_line_ratio {
        return None;
    }
    Some(Finding::new(
        "REPEATED_LINES",
        Severity::Warn,
        "Repeated lines suggest header/footer noise.",
        json!({ "repeatedLineRatio": stats.repeated_line_ratio }),
        "Remove recurring headers or footers and reprocess.",
    ))
}

pub fn check_header_footer_removal(stats: &NormalizationStats) -> Option<Finding> {
    if stats.removed_header_lines.is_empty() && stats.removed_footer_lines.is_empty() {
        return None;
    }
    Some(Finding::new(
        "HEADER_FOOTER_REMOVAL",
        Severity::Info,
        "Repeated headers or footers were removed during normalization.",
        json!({
            "headers": stats.removed_header_lines,
            "footers": stats.removed_footer_lines,
        }),
        "Review the cleaned output to ensure important data was preserved.",
    ))
}

/// Another catalog file shares this file's base filename but carries a
/// different revision token; one of the two likely supersedes the other.
pub fn check_superseded_version(
    recent: &[FileEntry],
    ctx: &QualityContext<'_>,
) -> Option<Finding> {
    let base = classify::base_filename(ctx.filename);
    if base.is_empty() {
        return None;
    }
    let revision = classify::extract_revision_token(ctx.filename);

    let mut conflicts = Vec::new();
    for entry in recent {
        if entry.file_id == ctx.file_id {
            continue;
        }
        if classify::base_filename(&entry.filename) != base {
            continue;
        }
        let other_revision = classify::extract_revision_token(&entry.filename);
        if other_revision == revision {
            continue;
        }
        if revision.is_none() && other_revision.is_none() {
            continue;
        }
        conflicts.push(json!({
            "fileId": entry.file_id,
            "filename": entry.filename,
            "revision": other_revision,
        }));
    }
    if conflicts.is_empty() {
        return None;
    }
    Some(Finding::new(
        "SUPERSEDED_VERSION",
        Severity::Warn,
        "Files with the same base name differ only by revision token.",
        json!({ "revision": revision, "conflicts": conflicts }),
        "Keep only the current revision in the dataset.",
    ))
}

/// Neither filename nor leading text carries a revision token or a date.
pub fn check_revision_metadata(ctx: &QualityContext<'_>) -> Option<Finding> {
    let head: String = ctx.cleaned_text.chars().take(1_000).collect();
    let has_revision = classify::extract_revision_token(ctx.filename).is_some()
        || classify::extract_revision_token(&head).is_some();
    let has_date = classify::contains_date(ctx.filename) || classify::contains_date(&head);
    if has_revision || has_date {
        return None;
    }
    Some(Finding::new(
        "MISSING_REVISION_METADATA",
        Severity::Info,
        "No revision token or date found in the filename or leading text.",
        json!({ "filename": ctx.filename }),
        "Add a revision or issue date so superseded copies can be detected.",
    ))
}

/// Domain-standard references present; a positive retrieval signal.
pub fn check_standards_referenced(ctx: &QualityContext<'_>) -> Option<Finding> {
    let mut standards = classify::extract_standards(ctx.cleaned_text);
    if standards.is_empty() {
        return None;
    }
    standards.truncate(10);
    Some(Finding::new(
        "STANDARDS_REFERENCED",
        Severity::Info,
        "Document references recognized industry standards.",
        json!({ "standards": standards }),
        "No action needed; references improve retrieval matching.",
    ))
}

/// Run the full quality pass for one document: duplicate detection plus all
/// advisory checks, fingerprint persistence, and report assembly.
///
/// The returned report is a write-once snapshot; callers persist it as-is.
pub async fn run_quality(
    catalog: &dyn FileCatalog,
    ctx: &QualityContext<'_>,
    opts: &QualityOptions,
) -> Result<QualityReport> {
    let mut findings = Vec::new();

    if let Some(finding) = check_exact_duplicate(catalog, ctx).await? {
        findings.push(finding);
    }

    let fingerprint = simhash::simhash(ctx.cleaned_text);
    let recent = catalog
        .recent_files(ctx.tenant_id, opts.recent_window)
        .await?;
    if let Some(finding) = check_near_duplicates(fingerprint, &recent, ctx, opts) {
        findings.push(finding);
    }

    let advisory = [
        check_text_volume(ctx.extraction, opts),
        check_non_alpha_ratio(ctx.extraction, opts),
        check_repeated_lines(ctx.extraction, opts),
        check_header_footer_removal(ctx.normalization),
        check_superseded_version(&recent, ctx),
        check_revision_metadata(ctx),
        check_standards_referenced(ctx),
    ];
    findings.extend(advisory.into_iter().flatten());

    catalog
        .record_fingerprint(ctx.tenant_id, ctx.file_id, fingerprint)
        .await?;

    let readiness_score = readiness::compute_readiness(&findings);
    let summary = readiness::summarize(&findings);

    info!(
        tenant_id = ctx.tenant_id,
        dataset_id = ctx.dataset_id,
        file_id = ctx.file_id,
        readiness_score,
        findings = findings.len(),
        "quality checks complete"
    );

    Ok(QualityReport {
        tenant_id: ctx.tenant_id.to_string(),
        dataset_id: ctx.dataset_id.to_string(),
        file_id: ctx.file_id.to_string(),
        readiness_score,
        summary,
        findings,
    })
}
