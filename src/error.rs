//! Pipeline error kinds.
//!
//! Every variant here aborts the whole document run; none are retried
//! internally. Advisory findings are *not* errors; they travel as data in
//! the quality report (see [`crate::models::Finding`]).

use thiserror::Error;

/// Fatal errors raised by the ingestion core.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The segmenter produced no chunks for a document (no chunkable text).
    #[error("document produced no chunkable text")]
    SegmentationEmpty,

    /// Required configuration is absent or invalid. Raised pre-flight,
    /// before any network call.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// The embedding provider returned vectors of the wrong dimension.
    /// Batches written before detection stay committed; the next full run
    /// replaces them.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    /// The embedding response carried none of the known value keys
    /// (`embedding`, `embeddings`, `vector`).
    #[error("unsupported embedding response format")]
    UnsupportedEmbeddingResponse,

    /// A bulk index write reported per-item failures. Carries at most the
    /// first three item errors.
    #[error("bulk index write rejected: {sample:?}")]
    IndexBulkWrite { sample: Vec<String> },

    /// The backend connection could not be established or revived.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A backend request completed with a failure status.
    #[error("backend request failed ({status}): {body}")]
    BackendRequest { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
