//! Embedding provider abstraction and HTTP implementation.
//!
//! [`Embedder`] is the seam to the embedding service. [`embed_texts`] fans
//! a batch out across a bounded worker set and reassembles results in
//! input order: the caller zips them back to their originating records
//! positionally, so completion order must never leak through.
//!
//! Response parsing accepts three shapes, in priority order: a top-level
//! `embedding` array, an `embeddings` array (first element), or a `vector`
//! array. Anything else is an unsupported-format error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded on chunk records.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding provider calling a remote HTTP endpoint.
///
/// The endpoint is the full invoke URL; each call posts
/// `{"inputText": …}` and parses the response body.
pub struct HttpEmbedder {
    endpoint: String,
    model_id: String,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, model_id: &str, timeout_secs: u64) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(PipelineError::MissingConfiguration(
                "embedding.endpoint is required".to_string(),
            ));
        }
        if model_id.trim().is_empty() {
            return Err(PipelineError::MissingConfiguration(
                "embedding.model is required".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "inputText": text }))
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

        let body: Value = response.json().await?;
        parse_embedding_response(&body)
    }
}

/// Extract the embedding vector from a provider response.
pub fn parse_embedding_response(body: &Value) -> Result<Vec<f32>> {
    if let Some(values) = body.get("embedding").and_then(Value::as_array) {
        return Ok(to_f32(values));
    }
    if let Some(first) = body
        .get("embeddings")
        .and_then(Value::as_array)
        .and_then(|outer| outer.first())
        .and_then(Value::as_array)
    {
        return Ok(to_f32(first));
    }
    if let Some(values) = body.get("vector").and_then(Value::as_array) {
        return Ok(to_f32(values));
    }
    Err(PipelineError::UnsupportedEmbeddingResponse)
}

fn to_f32(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Embed a batch of texts under bounded concurrency.
///
/// At most `concurrency` calls run at once; the returned vectors are in
/// the same order as `texts` regardless of completion order. The first
/// failed call fails the whole batch.
pub async fn embed_texts(
    embedder: Arc<dyn Embedder>,
    texts: &[String],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut handles = Vec::with_capacity(texts.len());
    for text in texts {
        let embedder = Arc::clone(&embedder);
        let semaphore = Arc::clone(&semaphore);
        let text = text.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("embedding semaphore closed");
            embedder.embed(&text).await
        }));
    }

    let mut embeddings = Vec::with_capacity(handles.len());
    for handle in handles {
        let vector = handle
            .await
            .map_err(|e| PipelineError::BackendUnavailable(format!("embedding worker: {e}")))??;
        embeddings.push(vector);
    }
    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_embedding_key() {
        let body = json!({ "embedding": [0.1, 0.2, 0.3] });
        let vector = parse_embedding_response(&body).unwrap();
        assert_eq!(vector.len(), 3);
        assert!((vector[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embeddings_list_takes_first() {
        let body = json!({ "embeddings": [[1.0, 2.0], [3.0, 4.0]] });
        assert_eq!(parse_embedding_response(&body).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_parse_vector_key_accepted() {
        let body = json!({ "vector": [0.5, 0.25] });
        assert_eq!(parse_embedding_response(&body).unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_parse_priority_order() {
        let body = json!({
            "vector": [9.0],
            "embedding": [1.0],
            "embeddings": [[2.0]],
        });
        assert_eq!(parse_embedding_response(&body).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_parse_unsupported_shape() {
        let body = json!({ "result": [1.0] });
        assert!(matches!(
            parse_embedding_response(&body),
            Err(PipelineError::UnsupportedEmbeddingResponse)
        ));
    }

    #[test]
    fn test_missing_configuration_preflight() {
        assert!(matches!(
            HttpEmbedder::new("", "model", 30),
            Err(PipelineError::MissingConfiguration(_))
        ));
        assert!(matches!(
            HttpEmbedder::new("http://localhost:9999", "", 30),
            Err(PipelineError::MissingConfiguration(_))
        ));
    }

    /// Embedder that finishes in reverse submission order.
    struct ReversingEmbedder {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for ReversingEmbedder {
        fn model_id(&self) -> &str {
            "mock"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            // later inputs sleep less, so completion order reverses
            let index: u64 = text.parse().unwrap();
            tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(index * 10))).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![index as f32])
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_results_in_input_order() {
        let embedder = Arc::new(ReversingEmbedder {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let texts: Vec<String> = (0..6).map(|i| i.to_string()).collect();

        let embeddings = embed_texts(embedder.clone(), &texts, 4).await.unwrap();

        let order: Vec<f32> = embeddings.iter().map(|v| v[0]).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(embedder.max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        struct Never;
        #[async_trait]
        impl Embedder for Never {
            fn model_id(&self) -> &str {
                "never"
            }
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                unreachable!()
            }
        }
        let embeddings = embed_texts(Arc::new(Never), &[], 4).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
