//! Chunk record construction, normalization, and JSONL persistence.
//!
//! Records written by the chunk stage are fully populated; records arriving
//! from older ingests may be missing identifiers or carry the legacy
//! `chunkId` key. [`normalize_record`] is the single, explicit defaulting
//! step that turns any raw record into a [`ChunkRecord`] before embedding.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address;
use crate::classify;
use crate::error::Result;
use crate::models::{ChunkRecord, ClassificationMetadata};

/// A chunk record as read from storage: every field optional, legacy keys
/// tolerated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawChunkRecord {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    /// Legacy identifier key used by earlier record producers.
    #[serde(default, rename = "chunkId")]
    pub legacy_chunk_id: Option<String>,
    #[serde(default)]
    pub chunk_index: Option<i64>,
    #[serde(default)]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub acl: Option<Vec<String>>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub doc_type_confidence: Option<f64>,
    #[serde(default)]
    pub discipline: Option<String>,
    #[serde(default)]
    pub section_reference: Option<String>,
    #[serde(default)]
    pub standards_referenced: Option<Vec<String>>,
    /// Legacy metadata envelope; dropped at normalization.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl RawChunkRecord {
    /// Classification metadata carried by the record, if any.
    fn classification(&self) -> Option<ClassificationMetadata> {
        self.doc_type.as_ref()?;
        Some(ClassificationMetadata {
            doc_type: self.doc_type.clone().unwrap_or_default(),
            doc_type_confidence: self.doc_type_confidence.unwrap_or(0.0),
            discipline: self.discipline.clone(),
            section_reference: self.section_reference.clone(),
            standards_referenced: self.standards_referenced.clone().unwrap_or_default(),
        })
    }
}

/// Per-document defaults applied to raw records at normalization time.
#[derive(Debug, Clone)]
pub struct RecordDefaults<'a> {
    pub tenant_id: &'a str,
    pub dataset_id: &'a str,
    pub doc_id: &'a str,
    pub source_uri: &'a str,
    pub filename: &'a str,
    pub created_at: &'a str,
    pub embedding_model: &'a str,
}

/// Build a fully-populated record for a freshly segmented chunk.
pub fn build_chunk_record(
    defaults: &RecordDefaults<'_>,
    page: Option<i64>,
    chunk_index: i64,
    text: &str,
    acl: Vec<String>,
    classify_metadata: bool,
) -> ChunkRecord {
    let classification = classify_metadata.then(|| classify::classify_chunk(text));
    ChunkRecord {
        tenant_id: defaults.tenant_id.to_string(),
        dataset_id: defaults.dataset_id.to_string(),
        doc_id: defaults.doc_id.to_string(),
        chunk_id: address::chunk_id(defaults.doc_id, page, chunk_index),
        chunk_index,
        source_uri: defaults.source_uri.to_string(),
        filename: defaults.filename.to_string(),
        page,
        text: text.to_string(),
        created_at: defaults.created_at.to_string(),
        embedding_model: defaults.embedding_model.to_string(),
        content_hash: address::content_hash(defaults.doc_id, page, chunk_index, text),
        acl,
        classification,
    }
}

/// Normalize a raw record: apply defaults for absent fields, promote the
/// legacy identifier, and synthesize chunk_id/content_hash when missing.
///
/// `fallback_index` is the record's position in the input stream, used when
/// the record itself carries no chunk index.
pub fn normalize_record(
    raw: RawChunkRecord,
    defaults: &RecordDefaults<'_>,
    fallback_index: i64,
) -> ChunkRecord {
    let classification = raw.classification();
    let doc_id = raw.doc_id.unwrap_or_else(|| defaults.doc_id.to_string());
    let chunk_index = raw.chunk_index.unwrap_or(fallback_index);
    let page = raw.page;

    let chunk_id = raw
        .chunk_id
        .or(raw.legacy_chunk_id)
        .unwrap_or_else(|| address::chunk_id(&doc_id, page, chunk_index));
    let content_hash = raw
        .content_hash
        .unwrap_or_else(|| address::content_hash(&doc_id, page, chunk_index, &raw.text));

    ChunkRecord {
        tenant_id: defaults.tenant_id.to_string(),
        dataset_id: defaults.dataset_id.to_string(),
        doc_id,
        chunk_id,
        chunk_index,
        source_uri: raw
            .source_uri
            .unwrap_or_else(|| defaults.source_uri.to_string()),
        filename: raw
            .filename
            .unwrap_or_else(|| defaults.filename.to_string()),
        page,
        text: raw.text,
        created_at: raw
            .created_at
            .unwrap_or_else(|| defaults.created_at.to_string()),
        embedding_model: raw
            .embedding_model
            .unwrap_or_else(|| defaults.embedding_model.to_string()),
        content_hash,
        acl: raw.acl.unwrap_or_default(),
        classification,
    }
}

/// Write records as newline-delimited JSON, one record per line.
pub fn write_records(path: &Path, records: &[ChunkRecord]) -> Result<()> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record)?);
    }
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body)?;
    Ok(())
}

/// Read newline-delimited raw records, skipping blank lines.
pub fn read_records(path: &Path) -> Result<Vec<RawChunkRecord>> {
    let body = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}
