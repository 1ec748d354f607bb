//! Stage orchestration over files.
//!
//! The platform's orchestrator invokes stages individually; these helpers
//! are the file-in/file-out plumbing the CLI drives: pages JSON in, chunk
//! records JSONL and quality report JSON out. Sequencing and retries live
//! outside the core.

use std::path::Path;

use chrono::Utc;
use tracing::info;

use crate::catalog::FileCatalog;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::models::{Finding, NormalizationStats, Page, QualityReport};
use crate::quality::{run_quality, QualityContext};
use crate::readiness;
use crate::records::{build_chunk_record, write_records, RecordDefaults};
use crate::segment::{chunk_pages, chunk_warnings};
use crate::textstats::extraction_stats;

/// Identity of the document moving through a run.
#[derive(Debug, Clone)]
pub struct DocumentRef<'a> {
    pub tenant_id: &'a str,
    pub dataset_id: &'a str,
    pub doc_id: &'a str,
    pub filename: &'a str,
    pub source_uri: &'a str,
}

/// Outcome of the chunk stage.
#[derive(Debug)]
pub struct ChunkStageSummary {
    pub chunk_count: usize,
    pub warnings: Vec<Finding>,
}

/// Read the pages artifact: a JSON array of `{pageNumber, text}`.
pub fn read_pages(path: &Path) -> Result<Vec<Page>> {
    let body = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

/// Segment a document's pages and write its chunk records as JSONL.
///
/// A document with no chunkable text is a fatal [`PipelineError::SegmentationEmpty`];
/// under- and over-length chunks only produce advisory warnings.
pub fn run_chunk_stage(
    config: &Config,
    doc: &DocumentRef<'_>,
    pages: &[Page],
    out_path: &Path,
) -> Result<ChunkStageSummary> {
    let opts = config.chunking.segmenter_options();
    let chunks = chunk_pages(pages, &opts);
    if chunks.is_empty() {
        return Err(PipelineError::SegmentationEmpty);
    }
    let warnings = chunk_warnings(&chunks, config.chunking.min_warn, config.chunking.max_warn);

    let created_at = Utc::now().to_rfc3339();
    let embedding_model = config.embedding.model.clone().unwrap_or_default();
    let defaults = RecordDefaults {
        tenant_id: doc.tenant_id,
        dataset_id: doc.dataset_id,
        doc_id: doc.doc_id,
        source_uri: doc.source_uri,
        filename: doc.filename,
        created_at: &created_at,
        embedding_model: &embedding_model,
    };

    let records: Vec<_> = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            build_chunk_record(
                &defaults,
                Some(chunk.page_range.0),
                index as i64,
                &chunk.text,
                Vec::new(),
                config.chunking.classify,
            )
        })
        .collect();
    write_records(out_path, &records)?;

    info!(
        tenant_id = doc.tenant_id,
        dataset_id = doc.dataset_id,
        doc_id = doc.doc_id,
        chunks = records.len(),
        warnings = warnings.len(),
        "chunk stage complete"
    );

    Ok(ChunkStageSummary {
        chunk_count: records.len(),
        warnings,
    })
}

/// Run the quality checks over a document's pages.
pub async fn run_quality_stage(
    config: &Config,
    doc: &DocumentRef<'_>,
    pages: &[Page],
    raw_sha256: Option<&str>,
    normalization: &NormalizationStats,
    catalog: &dyn FileCatalog,
) -> Result<QualityReport> {
    let extraction = extraction_stats(pages);
    let cleaned_text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let ctx = QualityContext {
        tenant_id: doc.tenant_id,
        dataset_id: doc.dataset_id,
        file_id: doc.doc_id,
        filename: doc.filename,
        cleaned_text: &cleaned_text,
        raw_sha256,
        extraction: &extraction,
        normalization,
    };
    run_quality(catalog, &ctx, &config.quality.quality_options()).await
}

/// Fold segmentation warnings into an existing report.
///
/// The adjustment uses its own, smaller deduction table (WARN only); the
/// merged findings are re-summarized and the result is a fresh write-once
/// snapshot.
pub fn finalize_report(report: QualityReport, chunk_warnings: Vec<Finding>) -> QualityReport {
    let readiness_score = readiness::adjust_readiness(report.readiness_score, &chunk_warnings);
    let mut findings = report.findings;
    findings.extend(chunk_warnings);
    let summary = readiness::summarize(&findings);

    QualityReport {
        tenant_id: report.tenant_id,
        dataset_id: report.dataset_id,
        file_id: report.file_id,
        readiness_score,
        summary,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use serde_json::Value;

    #[test]
    fn test_finalize_adjusts_and_merges() {
        let report = QualityReport {
            tenant_id: "t1".into(),
            dataset_id: "d1".into(),
            file_id: "f1".into(),
            readiness_score: 85,
            summary: readiness::summarize(&[]),
            findings: vec![Finding::new(
                "LOW_TEXT_VOLUME",
                Severity::Warn,
                "short",
                Value::Null,
                "check",
            )],
        };
        let warnings = vec![
            Finding::new("CHUNK_TOO_SMALL", Severity::Warn, "small", Value::Null, "adjust"),
            Finding::new("CHUNK_TOO_SMALL", Severity::Warn, "small", Value::Null, "adjust"),
        ];

        let finalized = finalize_report(report, warnings);
        // 85 - 2×3, not the primary WARN deduction
        assert_eq!(finalized.readiness_score, 79);
        assert_eq!(finalized.findings.len(), 3);
        assert_eq!(finalized.summary.warn, 3);
    }
}
