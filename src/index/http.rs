//! HTTP document-index backend.
//!
//! Speaks the index-over-HTTP protocol: index lifecycle management with a
//! three-state check (absent, compatible, incompatible dimension),
//! delete-by-query for per-document replace, NDJSON bulk writes, and knn
//! search. The HTTP client is created lazily once per store and reused for
//! every call.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::ChunkRecord;

use super::{SearchHit, VectorBackend};

pub struct HttpIndexStore {
    endpoint: String,
    index_name: String,
    dimension: usize,
    client: OnceCell<reqwest::Client>,
}

impl HttpIndexStore {
    pub fn new(endpoint: &str, index_name: &str, dimension: usize) -> Result<Self> {
        if endpoint.trim().is_empty() || index_name.trim().is_empty() {
            return Err(PipelineError::MissingConfiguration(
                "index.http.endpoint and index.http.index_name are required".to_string(),
            ));
        }
        if dimension == 0 {
            return Err(PipelineError::MissingConfiguration(
                "embedding.dims must be configured and positive".to_string(),
            ));
        }
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
            dimension,
            client: OnceCell::new(),
        })
    }

    /// The cached client, created on first use and reused afterwards.
    async fn ensure_live(&self) -> Result<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .build()
                    .map_err(|e| PipelineError::BackendUnavailable(e.to_string()))
            })
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn create_index(&self) -> Result<()> {
        let client = self.ensure_live().await?;
        let mapping = index_mapping(self.dimension);
        let response = client
            .put(self.url(&format!("/{}", self.index_name)))
            .json(&mapping)
            .send()
            .await?;
        expect_success(response).await?;
        info!(index = %self.index_name, dimension = self.dimension, "index created");
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for HttpIndexStore {
    async fn ensure_ready(&self) -> Result<()> {
        let client = self.ensure_live().await?;

        let head = client
            .head(self.url(&format!("/{}", self.index_name)))
            .send()
            .await?;
        let status = head.status();

        if status == StatusCode::OK {
            let mapping = client
                .get(self.url(&format!("/{}/_mapping", self.index_name)))
                .send()
                .await?;
            if mapping.status() != StatusCode::OK {
                return Ok(());
            }
            let payload: Value = mapping.json().await?;
            let existing = payload
                .get(&self.index_name)
                .and_then(|m| m.pointer("/mappings/properties/vector/dimension"))
                .and_then(Value::as_u64);
            match existing {
                Some(dimension) if dimension as usize != self.dimension => {
                    // incompatible: recreate with the target dimension
                    debug!(
                        index = %self.index_name,
                        existing = dimension,
                        target = self.dimension,
                        "recreating index with new vector dimension"
                    );
                    let delete = client
                        .delete(self.url(&format!("/{}", self.index_name)))
                        .send()
                        .await?;
                    expect_success(delete).await?;
                    self.create_index().await
                }
                _ => Ok(()),
            }
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            self.create_index().await
        } else {
            Err(PipelineError::BackendRequest {
                status: status.as_u16(),
                body: format!("unexpected index check status for {}", self.index_name),
            })
        }
    }

    async fn delete_document(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        doc_id: &str,
    ) -> Result<u64> {
        let client = self.ensure_live().await?;
        let query = json!({
            "query": {
                "bool": {
                    "filter": [
                        { "term": { "tenant_id": tenant_id } },
                        { "term": { "dataset_id": dataset_id } },
                        { "term": { "doc_id": doc_id } },
                    ]
                }
            }
        });
        let response = client
            .post(self.url(&format!("/{}/_delete_by_query", self.index_name)))
            .json(&query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::BackendRequest {
                status: status.as_u16(),
                body,
            });
        }
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        Ok(payload.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn insert_chunks(
        &self,
        records: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        let client = self.ensure_live().await?;
        let payload = build_bulk_payload(&self.index_name, records, embeddings)?;

        let response = client
            .post(self.url(&format!("/{}/_bulk", self.index_name)))
            .header("content-type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::BackendRequest {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        ensure_bulk_ok(&body)
    }

    async fn search(
        &self,
        tenant_id: &str,
        dataset_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let client = self.ensure_live().await?;
        let body = json!({
            "size": top_k,
            "query": {
                "bool": {
                    "filter": [
                        { "term": { "tenant_id": tenant_id } },
                        { "term": { "dataset_id": dataset_id } },
                    ],
                    "must": [
                        { "knn": { "vector": { "vector": query, "k": top_k } } }
                    ]
                }
            }
        });
        let response = client
            .post(self.url(&format!("/{}/_search", self.index_name)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::BackendRequest {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        let empty = Vec::new();
        let hits = payload
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        Ok(hits
            .iter()
            .map(|hit| {
                let source = hit.get("_source").cloned().unwrap_or(Value::Null);
                SearchHit {
                    chunk_id: string_field(&source, "chunk_id"),
                    doc_id: string_field(&source, "doc_id"),
                    filename: string_field(&source, "filename"),
                    page: source.get("page").and_then(Value::as_i64),
                    chunk_index: source.get("chunk_index").and_then(Value::as_i64).unwrap_or(0),
                    text: string_field(&source, "text"),
                    score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
                }
            })
            .collect())
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Index settings and typed field mappings, including the knn vector field
/// with the configured dimension.
pub(crate) fn index_mapping(dimension: usize) -> Value {
    json!({
        "settings": { "index": { "knn": true } },
        "mappings": {
            "properties": {
                "tenant_id": { "type": "keyword" },
                "dataset_id": { "type": "keyword" },
                "doc_id": { "type": "keyword" },
                "chunk_id": { "type": "keyword" },
                "source_uri": { "type": "keyword" },
                "filename": { "type": "keyword" },
                "page": { "type": "integer" },
                "chunk_index": { "type": "integer" },
                "created_at": { "type": "date" },
                "embedding_model": { "type": "keyword" },
                "content_hash": { "type": "keyword" },
                "acl": { "type": "keyword" },
                "text": { "type": "text" },
                "vector": { "type": "knn_vector", "dimension": dimension },
            }
        }
    })
}

/// Append-only action/document NDJSON pairs for one batch.
pub(crate) fn build_bulk_payload(
    index_name: &str,
    records: &[ChunkRecord],
    embeddings: &[Vec<f32>],
) -> Result<String> {
    let mut lines = Vec::with_capacity(records.len() * 2);
    for (record, embedding) in records.iter().zip(embeddings.iter()) {
        let action = json!({ "index": { "_index": index_name } });
        let mut doc = serde_json::to_value(record)?;
        doc["vector"] = json!(embedding);
        lines.push(action.to_string());
        lines.push(doc.to_string());
    }
    let mut payload = lines.join("\n");
    payload.push('\n');
    Ok(payload)
}

/// A 2xx bulk response may still carry per-item failures behind a top-level
/// `errors` flag. Collect at most the first three.
pub(crate) fn ensure_bulk_ok(body: &Value) -> Result<()> {
    if !body
        .get("errors")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Ok(());
    }
    let empty = Vec::new();
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut sample = Vec::new();
    for item in items {
        let action = item
            .as_object()
            .and_then(|map| map.values().next())
            .cloned()
            .unwrap_or(Value::Null);
        if let Some(error) = action.get("error") {
            sample.push(error.to_string());
            if sample.len() == 3 {
                break;
            }
        }
    }
    Err(PipelineError::IndexBulkWrite { sample })
}

async fn expect_success(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::BackendRequest {
        status: status.as_u16(),
        body,
    })
}
