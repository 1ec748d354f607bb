//! Postgres + pgvector backend.
//!
//! Holds one lazily-created connection for the life of the store, not a
//! pool. [`PgVectorStore::ensure_live`] is the single coordinated
//! check-then-use step: it pings the cached connection under the lock and
//! reconnects when the handle is gone or dead.
//!
//! The row-level upsert only refreshes text, embedding, content hash, and
//! created-at; classification columns written by out-of-band enrichment are
//! left alone unless the row is reinserted fresh after the document-level
//! delete.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::ChunkRecord;

use super::{SearchHit, VectorBackend};

pub struct PgVectorStore {
    url: String,
    dimension: usize,
    conn: Mutex<Option<PgConnection>>,
}

impl PgVectorStore {
    pub fn new(url: &str, dimension: usize) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(PipelineError::MissingConfiguration(
                "index.postgres.url is required".to_string(),
            ));
        }
        if dimension == 0 {
            return Err(PipelineError::MissingConfiguration(
                "embedding.dims must be configured and positive".to_string(),
            ));
        }
        Ok(Self {
            url: url.to_string(),
            dimension,
            conn: Mutex::new(None),
        })
    }

    /// Lock the cached connection, reviving it if absent or dead.
    async fn ensure_live(&self) -> Result<MutexGuard<'_, Option<PgConnection>>> {
        let mut guard = self.conn.lock().await;
        let alive = match guard.as_mut() {
            Some(conn) => conn.ping().await.is_ok(),
            None => false,
        };
        if !alive {
            debug!("connecting to postgres backend");
            let conn = PgConnection::connect(&self.url)
                .await
                .map_err(|e| PipelineError::BackendUnavailable(e.to_string()))?;
            *guard = Some(conn);
        }
        Ok(guard)
    }
}

#[async_trait]
impl VectorBackend for PgVectorStore {
    async fn ensure_ready(&self) -> Result<()> {
        let mut guard = self.ensure_live().await?;
        let conn = guard.as_mut().expect("connection present after ensure_live");

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&mut *conn)
            .await?;

        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                tenant_id TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                chunk_id TEXT NOT NULL UNIQUE,
                source_uri TEXT,
                filename TEXT,
                page INTEGER,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding vector({dim}),
                content_hash TEXT,
                embedding_model TEXT,
                acl TEXT[] NOT NULL DEFAULT '{{}}',
                created_at TIMESTAMPTZ,
                doc_type TEXT,
                discipline TEXT,
                section_reference TEXT,
                standards_referenced TEXT[]
            )
            "#,
            dim = self.dimension
        );
        sqlx::query(&ddl).execute(&mut *conn).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_document
             ON chunks(tenant_id, dataset_id, doc_id)",
        )
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn delete_document(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        doc_id: &str,
    ) -> Result<u64> {
        let mut guard = self.ensure_live().await?;
        let conn = guard.as_mut().expect("connection present after ensure_live");

        let result = sqlx::query(
            "DELETE FROM chunks WHERE tenant_id = $1 AND dataset_id = $2 AND doc_id = $3",
        )
        .bind(tenant_id)
        .bind(dataset_id)
        .bind(doc_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_chunks(
        &self,
        records: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        let mut guard = self.ensure_live().await?;
        let conn = guard.as_mut().expect("connection present after ensure_live");

        for (record, embedding) in records.iter().zip(embeddings.iter()) {
            let classification = record.classification.as_ref();
            sqlx::query(
                r#"
                INSERT INTO chunks (
                    tenant_id, dataset_id, doc_id, chunk_id, source_uri, filename,
                    page, chunk_index, text, embedding, content_hash, embedding_model,
                    acl, created_at, doc_type, discipline, section_reference, standards_referenced
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14::timestamptz, $15, $16, $17, $18
                )
                ON CONFLICT (chunk_id) DO UPDATE SET
                    text = EXCLUDED.text,
                    embedding = EXCLUDED.embedding,
                    content_hash = EXCLUDED.content_hash,
                    created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&record.tenant_id)
            .bind(&record.dataset_id)
            .bind(&record.doc_id)
            .bind(&record.chunk_id)
            .bind(&record.source_uri)
            .bind(&record.filename)
            .bind(record.page.map(|p| p as i32))
            .bind(record.chunk_index as i32)
            .bind(&record.text)
            .bind(Vector::from(embedding.clone()))
            .bind(&record.content_hash)
            .bind(&record.embedding_model)
            .bind(&record.acl)
            .bind(&record.created_at)
            .bind(classification.map(|c| c.doc_type.clone()))
            .bind(classification.and_then(|c| c.discipline.clone()))
            .bind(classification.and_then(|c| c.section_reference.clone()))
            .bind(classification.map(|c| c.standards_referenced.clone()))
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut guard = self.ensure_live().await?;
        let conn = guard.as_mut().expect("connection present after ensure_live");

        let rows = sqlx::query(
            r#"
            SELECT
                chunk_id, doc_id, filename, page, chunk_index, text,
                1 - (embedding <=> $1) AS score
            FROM chunks
            WHERE tenant_id = $2 AND dataset_id = $3
            ORDER BY embedding <=> $1
            LIMIT $4
            "#,
        )
        .bind(Vector::from(query.to_vec()))
        .bind(tenant_id)
        .bind(dataset_id)
        .bind(top_k as i64)
        .fetch_all(&mut *conn)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            hits.push(SearchHit {
                chunk_id: row.try_get("chunk_id")?,
                doc_id: row.try_get("doc_id")?,
                filename: row.try_get::<Option<String>, _>("filename")?.unwrap_or_default(),
                page: row
                    .try_get::<Option<i32>, _>("page")?
                    .map(|p| p as i64),
                chunk_index: row.try_get::<i32, _>("chunk_index")? as i64,
                text: row.try_get("text")?,
                score: row.try_get::<f64, _>("score")?,
            });
        }
        Ok(hits)
    }
}
