//! Vector indexing: normalization, batched embedding, and idempotent
//! per-document replace-upsert against one of two interchangeable backends.
//!
//! The capability seam is [`VectorBackend`]; implementations live in
//! [`http`] (document index over HTTP) and [`postgres`] (relational store
//! with a vector extension). A backend is chosen at startup and never mixed
//! at runtime.
//!
//! Replace semantics: all previously stored chunks of the target document
//! are deleted once, up front; batches are then written as they are
//! embedded. A mid-run abort (dimension mismatch, write failure) leaves
//! earlier batches committed: at-least-once at batch granularity, healed
//! by the next successful run's delete.

pub mod http;
pub mod postgres;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::embedding::{embed_texts, Embedder};
use crate::error::{PipelineError, Result};
use crate::models::ChunkRecord;
use crate::records::{normalize_record, RawChunkRecord, RecordDefaults};

/// A stored chunk returned from vector search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub doc_id: String,
    pub filename: String,
    pub page: Option<i64>,
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}

/// Capability interface over the two vector store implementations.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Bring the store to a usable state (index/table/extension present,
    /// vector dimension compatible). Idempotent.
    async fn ensure_ready(&self) -> Result<()>;

    /// Delete every stored chunk of `(tenant, dataset, doc)`. Returns the
    /// number of deleted chunks where the backend reports it.
    async fn delete_document(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        doc_id: &str,
    ) -> Result<u64>;

    /// Bulk-insert one embedded batch. `records` and `embeddings` are
    /// positionally aligned and equal in length.
    async fn insert_chunks(
        &self,
        records: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<()>;

    /// Vector similarity search scoped to a tenant and dataset.
    async fn search(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// Indexer tuning; see the config file for the exposed knobs.
#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Target embedding dimension. Mismatching vectors abort the run.
    pub dimension: usize,
    pub batch_size: usize,
    pub concurrency: usize,
}

/// Outcome of one document ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    /// Records embedded and written.
    pub processed: usize,
    /// Records skipped for empty text.
    pub skipped: usize,
    /// Batches written.
    pub batches: usize,
    /// Chunks deleted by the pre-ingestion replace.
    pub deleted: u64,
}

/// Turns chunk records into stored vectors, idempotently per document.
pub struct VectorIndexer {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    opts: IndexerOptions,
}

impl std::fmt::Debug for VectorIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndexer")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl VectorIndexer {
    /// Pre-flight validation happens here, before any network call.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn Embedder>,
        opts: IndexerOptions,
    ) -> Result<Self> {
        if opts.dimension == 0 {
            return Err(PipelineError::MissingConfiguration(
                "embedding.dims must be configured and positive".to_string(),
            ));
        }
        if opts.batch_size == 0 {
            return Err(PipelineError::MissingConfiguration(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        Ok(Self {
            backend,
            embedder,
            opts,
        })
    }

    /// Ingest one document's records: delete the document's stored chunks,
    /// then embed and write in fixed-size batches.
    ///
    /// Records with empty text are skipped, not errors. Any embedding or
    /// write failure aborts the run; committed batches stay.
    pub async fn ingest_document(
        &self,
        defaults: &RecordDefaults<'_>,
        raw_records: Vec<RawChunkRecord>,
    ) -> Result<IngestSummary> {
        let started = Instant::now();

        self.backend.ensure_ready().await?;
        let deleted = self
            .backend
            .delete_document(defaults.tenant_id, defaults.dataset_id, defaults.doc_id)
            .await?;

        let mut summary = IngestSummary {
            deleted,
            ..Default::default()
        };

        let mut batch: Vec<ChunkRecord> = Vec::with_capacity(self.opts.batch_size);
        for (index, raw) in raw_records.into_iter().enumerate() {
            if raw.text.trim().is_empty() {
                summary.skipped += 1;
                continue;
            }
            batch.push(normalize_record(raw, defaults, index as i64));

            if batch.len() >= self.opts.batch_size {
                self.flush_batch(&mut batch, &mut summary).await?;
            }
        }
        if !batch.is_empty() {
            self.flush_batch(&mut batch, &mut summary).await?;
        }

        info!(
            tenant_id = defaults.tenant_id,
            dataset_id = defaults.dataset_id,
            doc_id = defaults.doc_id,
            processed = summary.processed,
            skipped = summary.skipped,
            batches = summary.batches,
            deleted = summary.deleted,
            duration_ms = started.elapsed().as_millis() as u64,
            "vector ingestion complete"
        );

        Ok(summary)
    }

    async fn flush_batch(
        &self,
        batch: &mut Vec<ChunkRecord>,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let embeddings =
            embed_texts(Arc::clone(&self.embedder), &texts, self.opts.concurrency).await?;

        if let Some(first) = embeddings.first() {
            if first.len() != self.opts.dimension {
                warn!(
                    expected = self.opts.dimension,
                    actual = first.len(),
                    committed_batches = summary.batches,
                    "aborting run on embedding dimension mismatch"
                );
                return Err(PipelineError::EmbeddingDimensionMismatch {
                    expected: self.opts.dimension,
                    actual: first.len(),
                });
            }
        }

        self.backend.insert_chunks(batch, &embeddings).await?;
        summary.processed += batch.len();
        summary.batches += 1;
        batch.clear();
        Ok(())
    }
}
