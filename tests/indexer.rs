//! Integration tests for the vector indexer: batching, replace semantics,
//! skip handling, and the mid-run dimension-mismatch abort, driven with a
//! mock embedding provider and an in-memory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ragprep::embedding::Embedder;
use ragprep::error::{PipelineError, Result};
use ragprep::index::{IndexerOptions, SearchHit, VectorBackend, VectorIndexer};
use ragprep::models::ChunkRecord;
use ragprep::records::{RawChunkRecord, RecordDefaults};

/// Deterministic embedder: the vector's first component is the text length.
struct MockEmbedder {
    dims: usize,
    /// After this many calls, vectors come back with the wrong dimension.
    break_after: Option<usize>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn new(dims: usize) -> Self {
        Self {
            dims,
            break_after: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn breaking_after(dims: usize, calls: usize) -> Self {
        Self {
            dims,
            break_after: Some(calls),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_id(&self) -> &str {
        "mock-embed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let dims = match self.break_after {
            Some(threshold) if call >= threshold => self.dims / 2,
            _ => self.dims,
        };
        let mut vector = vec![0.0; dims];
        vector[0] = text.len() as f32;
        Ok(vector)
    }
}

type DocKey = (String, String, String);

/// In-memory backend recording batch sizes and stored rows.
#[derive(Default)]
struct MemoryBackend {
    rows: Mutex<HashMap<DocKey, Vec<(ChunkRecord, Vec<f32>)>>>,
    batch_sizes: Mutex<Vec<usize>>,
    ready_calls: AtomicUsize,
}

impl MemoryBackend {
    fn stored(&self, tenant: &str, dataset: &str, doc: &str) -> Vec<(ChunkRecord, Vec<f32>)> {
        self.rows
            .lock()
            .unwrap()
            .get(&(tenant.to_string(), dataset.to_string(), doc.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn ensure_ready(&self) -> Result<()> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_document(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        doc_id: &str,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let key = (
            tenant_id.to_string(),
            dataset_id.to_string(),
            doc_id.to_string(),
        );
        Ok(rows.remove(&key).map(|v| v.len() as u64).unwrap_or(0))
    }

    async fn insert_chunks(
        &self,
        records: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        assert_eq!(records.len(), embeddings.len());
        self.batch_sizes.lock().unwrap().push(records.len());

        let mut rows = self.rows.lock().unwrap();
        for (record, embedding) in records.iter().zip(embeddings.iter()) {
            let key = (
                record.tenant_id.clone(),
                record.dataset_id.clone(),
                record.doc_id.clone(),
            );
            rows.entry(key)
                .or_default()
                .push((record.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn search(
        &self,
        _tenant_id: &str,
        _dataset_id: &str,
        _query: &[f32],
        _top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

fn defaults() -> RecordDefaults<'static> {
    RecordDefaults {
        tenant_id: "tenant-1",
        dataset_id: "dataset-1",
        doc_id: "doc-1",
        source_uri: "blob://raw/tenant-1/doc.pdf",
        filename: "doc.pdf",
        created_at: "2025-01-01T00:00:00Z",
        embedding_model: "mock-embed",
    }
}

fn raw_record(index: i64, text: &str) -> RawChunkRecord {
    RawChunkRecord {
        chunk_index: Some(index),
        page: Some(1),
        text: text.to_string(),
        ..Default::default()
    }
}

fn indexer(
    backend: Arc<MemoryBackend>,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    batch_size: usize,
) -> VectorIndexer {
    VectorIndexer::new(
        backend,
        embedder,
        IndexerOptions {
            dimension,
            batch_size,
            concurrency: 4,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn batches_are_fixed_size_in_order() {
    let backend = Arc::new(MemoryBackend::default());
    let embedder = Arc::new(MockEmbedder::new(1536));
    let indexer = indexer(backend.clone(), embedder, 1536, 50);

    let records: Vec<RawChunkRecord> = (0..120)
        .map(|i| raw_record(i, &format!("chunk number {i} body text")))
        .collect();
    let summary = indexer.ingest_document(&defaults(), records).await.unwrap();

    assert_eq!(summary.processed, 120);
    assert_eq!(summary.batches, 3);
    assert_eq!(*backend.batch_sizes.lock().unwrap(), vec![50, 50, 20]);
    assert_eq!(backend.stored("tenant-1", "dataset-1", "doc-1").len(), 120);
}

#[tokio::test]
async fn embeddings_stay_aligned_to_records() {
    let backend = Arc::new(MemoryBackend::default());
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = indexer(backend.clone(), embedder, 8, 10);

    let records: Vec<RawChunkRecord> = (0..25)
        .map(|i| raw_record(i, &"x".repeat(10 + i as usize)))
        .collect();
    indexer.ingest_document(&defaults(), records).await.unwrap();

    for (record, embedding) in backend.stored("tenant-1", "dataset-1", "doc-1") {
        assert_eq!(embedding[0], record.text.len() as f32);
    }
}

#[tokio::test]
async fn reprocessing_leaves_no_orphans() {
    let backend = Arc::new(MemoryBackend::default());
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = indexer(backend.clone(), embedder, 8, 50);

    let first: Vec<RawChunkRecord> = (0..5)
        .map(|i| raw_record(i, &format!("first run chunk {i}")))
        .collect();
    indexer.ingest_document(&defaults(), first).await.unwrap();
    assert_eq!(backend.stored("tenant-1", "dataset-1", "doc-1").len(), 5);

    // second run shrinks the document to 3 chunks
    let second: Vec<RawChunkRecord> = (0..3)
        .map(|i| raw_record(i, &format!("second run chunk {i}")))
        .collect();
    let summary = indexer.ingest_document(&defaults(), second).await.unwrap();

    assert_eq!(summary.deleted, 5);
    let stored = backend.stored("tenant-1", "dataset-1", "doc-1");
    assert_eq!(stored.len(), 3);
    for (record, _) in stored {
        assert!(record.text.starts_with("second run"));
    }
}

#[tokio::test]
async fn empty_text_records_are_skipped() {
    let backend = Arc::new(MemoryBackend::default());
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = indexer(backend.clone(), embedder, 8, 50);

    let records = vec![
        raw_record(0, "real content"),
        raw_record(1, ""),
        raw_record(2, "   \n\t"),
        raw_record(3, "more real content"),
    ];
    let summary = indexer.ingest_document(&defaults(), records).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(backend.stored("tenant-1", "dataset-1", "doc-1").len(), 2);
}

#[tokio::test]
async fn dimension_mismatch_aborts_but_keeps_committed_batches() {
    let backend = Arc::new(MemoryBackend::default());
    // first 10 calls return dim 8, later calls dim 4
    let embedder = Arc::new(MockEmbedder::breaking_after(8, 10));
    let indexer = indexer(backend.clone(), embedder, 8, 10);

    let records: Vec<RawChunkRecord> = (0..25)
        .map(|i| raw_record(i, &format!("chunk {i}")))
        .collect();
    let err = indexer
        .ingest_document(&defaults(), records)
        .await
        .unwrap_err();

    match err {
        PipelineError::EmbeddingDimensionMismatch { expected, actual } => {
            assert_eq!(expected, 8);
            assert_eq!(actual, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // the first batch stays committed; the failing batch was never written
    assert_eq!(*backend.batch_sizes.lock().unwrap(), vec![10]);
    assert_eq!(backend.stored("tenant-1", "dataset-1", "doc-1").len(), 10);
}

#[tokio::test]
async fn preflight_rejects_missing_dimension() {
    let backend = Arc::new(MemoryBackend::default());
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(8));

    let err = VectorIndexer::new(
        backend,
        embedder,
        IndexerOptions {
            dimension: 0,
            batch_size: 50,
            concurrency: 4,
        },
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::MissingConfiguration(_)));
}

#[tokio::test]
async fn normalization_fills_identifiers_during_ingest() {
    let backend = Arc::new(MemoryBackend::default());
    let embedder = Arc::new(MockEmbedder::new(8));
    let indexer = indexer(backend.clone(), embedder, 8, 50);

    // bare record: only text, everything else defaulted at normalization
    let records = vec![RawChunkRecord {
        text: "legacy chunk with no identifiers".to_string(),
        ..Default::default()
    }];
    indexer.ingest_document(&defaults(), records).await.unwrap();

    let stored = backend.stored("tenant-1", "dataset-1", "doc-1");
    assert_eq!(stored.len(), 1);
    let (record, _) = &stored[0];
    assert_eq!(record.tenant_id, "tenant-1");
    assert_eq!(record.chunk_id, "doc-1#p0#c0");
    assert_eq!(record.embedding_model, "mock-embed");
    assert_eq!(record.content_hash.len(), 64);
}
