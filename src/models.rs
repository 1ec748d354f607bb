//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the pages, chunks, chunk records, and quality
//! findings that flow from segmentation through indexing. Severity is a
//! closed enum so the scorer and summarizer can match exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of extracted document text. Ephemeral input, ordered by number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "pageNumber")]
    pub number: i64,
    #[serde(default)]
    pub text: String,
}

/// A length-bounded slice of document text produced by the segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// `(min, max)` page numbers of all pages that contributed text.
    #[serde(rename = "pageRange")]
    pub page_range: (i64, i64),
    pub length: usize,
}

/// Finding severity. Deduction tables in [`crate::readiness`] key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "INFO")]
    Info,
}

/// A single advisory observation. Never raised as a control-flow error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub evidence: serde_json::Value,
    pub recommendation: String,
}

impl Finding {
    pub fn new(
        kind: &str,
        severity: Severity,
        description: impl Into<String>,
        evidence: serde_json::Value,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            description: description.into(),
            evidence,
            recommendation: recommendation.into(),
        }
    }
}

/// Per-severity finding counts. All three keys are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
    #[serde(rename = "WARN")]
    pub warn: usize,
    #[serde(rename = "INFO")]
    pub info: usize,
}

/// Write-once snapshot of a document's quality-check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    #[serde(rename = "datasetId")]
    pub dataset_id: String,
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "readinessScore")]
    pub readiness_score: i64,
    pub summary: FindingSummary,
    pub findings: Vec<Finding>,
}

/// Domain metadata attached to a chunk by the classification heuristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetadata {
    pub doc_type: String,
    pub doc_type_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_reference: Option<String>,
    #[serde(default)]
    pub standards_referenced: Vec<String>,
}

/// Fully-normalized chunk record, ready for embedding and storage.
///
/// `chunk_id` and `content_hash` are pure functions of their inputs (see
/// [`crate::address`]); a document's stored record set is replaced wholesale
/// on reprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub tenant_id: String,
    pub dataset_id: String,
    pub doc_id: String,
    pub chunk_id: String,
    pub chunk_index: i64,
    pub source_uri: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    pub text: String,
    pub created_at: String,
    pub embedding_model: String,
    pub content_hash: String,
    #[serde(default)]
    pub acl: Vec<String>,
    #[serde(flatten)]
    pub classification: Option<ClassificationMetadata>,
}

/// Extraction statistics over a document's pages, consumed by the advisory
/// quality checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    #[serde(rename = "textLength")]
    pub text_length: usize,
    #[serde(rename = "pageCount")]
    pub page_count: usize,
    #[serde(rename = "nonAlphaRatio")]
    pub non_alpha_ratio: f64,
    #[serde(rename = "repeatedLineRatio")]
    pub repeated_line_ratio: f64,
}

/// What the upstream normalization stage removed, if anything. Advisory
/// input only; absent stats mean no findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationStats {
    #[serde(rename = "removedHeaderLines", default)]
    pub removed_header_lines: Vec<String>,
    #[serde(rename = "removedFooterLines", default)]
    pub removed_footer_lines: Vec<String>,
}

/// A file known to the per-tenant catalog, as seen by duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_id: String,
    pub filename: String,
    /// SHA-256 of the raw uploaded bytes.
    pub content_hash: String,
    /// Simhash fingerprint from the file's last quality run.
    pub simhash: Option<u64>,
    pub created_at: DateTime<Utc>,
}
