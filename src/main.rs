//! # ragprep CLI
//!
//! Drives the ingestion stages individually, the way the platform's
//! orchestrator invokes them:
//!
//! ```bash
//! ragprep chunk --pages pages.json --out chunks.jsonl \
//!     --tenant t1 --dataset d1 --doc f1 --filename spec.pdf
//! ragprep quality --pages pages.json --out report.json \
//!     --tenant t1 --dataset d1 --doc f1 --filename spec.pdf
//! ragprep index --chunks chunks.jsonl \
//!     --tenant t1 --dataset d1 --doc f1 --filename spec.pdf
//! ragprep search "fire sprinkler layout" --tenant t1 --dataset d1
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use ragprep::catalog::MemoryCatalog;
use ragprep::config::{load_config, Config};
use ragprep::embedding::{Embedder, HttpEmbedder};
use ragprep::error::PipelineError;
use ragprep::index::http::HttpIndexStore;
use ragprep::index::postgres::PgVectorStore;
use ragprep::index::{IndexerOptions, VectorBackend, VectorIndexer};
use ragprep::models::NormalizationStats;
use ragprep::pipeline::{self, DocumentRef};
use ragprep::records;

/// Document ingestion and readiness pipeline for multi-tenant retrieval
/// platforms.
#[derive(Parser)]
#[command(
    name = "ragprep",
    about = "Document ingestion and readiness pipeline for multi-tenant retrieval platforms",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragprep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment extracted pages into chunk records (JSONL).
    Chunk {
        /// Pages artifact: JSON array of {pageNumber, text}.
        #[arg(long)]
        pages: PathBuf,
        /// Output chunk records file (JSONL).
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        doc: String,
        #[arg(long, default_value = "unknown.pdf")]
        filename: String,
        #[arg(long, default_value = "")]
        source_uri: String,
    },

    /// Run quality checks and write the quality report (JSON).
    Quality {
        #[arg(long)]
        pages: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        doc: String,
        #[arg(long, default_value = "unknown.pdf")]
        filename: String,
        /// Raw uploaded file, hashed for exact-duplicate detection.
        #[arg(long)]
        raw: Option<PathBuf>,
    },

    /// Embed chunk records and replace the document in the vector store.
    Index {
        /// Chunk records file (JSONL).
        #[arg(long)]
        chunks: PathBuf,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        doc: String,
        #[arg(long, default_value = "unknown.pdf")]
        filename: String,
        #[arg(long, default_value = "")]
        source_uri: String,
    },

    /// Vector search within a tenant's dataset.
    Search {
        query: String,
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        dataset: String,
        #[arg(long, default_value_t = 8)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // correlates one CLI invocation across all log lines
    let run_id = uuid::Uuid::new_v4();
    tracing::debug!(%run_id, "starting run");

    match cli.command {
        Commands::Chunk {
            pages,
            out,
            tenant,
            dataset,
            doc,
            filename,
            source_uri,
        } => {
            let doc_ref = DocumentRef {
                tenant_id: &tenant,
                dataset_id: &dataset,
                doc_id: &doc,
                filename: &filename,
                source_uri: &source_uri,
            };
            let page_list = pipeline::read_pages(&pages)?;
            let summary = pipeline::run_chunk_stage(&config, &doc_ref, &page_list, &out)?;

            println!("chunk {}", doc);
            println!("  pages: {}", page_list.len());
            println!("  chunks written: {}", summary.chunk_count);
            println!("  warnings: {}", summary.warnings.len());
            for warning in &summary.warnings {
                println!("    {}: {}", warning.kind, warning.description);
            }
            println!("ok");
        }

        Commands::Quality {
            pages,
            out,
            tenant,
            dataset,
            doc,
            filename,
            raw,
        } => {
            let doc_ref = DocumentRef {
                tenant_id: &tenant,
                dataset_id: &dataset,
                doc_id: &doc,
                filename: &filename,
                source_uri: "",
            };
            let page_list = pipeline::read_pages(&pages)?;
            let raw_sha256 = match raw {
                Some(path) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("Failed to read raw file: {}", path.display()))?;
                    Some(format!("{:x}", Sha256::digest(&bytes)))
                }
                None => None,
            };

            // standalone runs have no platform registry to compare against
            let catalog = MemoryCatalog::new();
            let report = pipeline::run_quality_stage(
                &config,
                &doc_ref,
                &page_list,
                raw_sha256.as_deref(),
                &NormalizationStats::default(),
                &catalog,
            )
            .await?;
            std::fs::write(&out, serde_json::to_string_pretty(&report)?)?;

            println!("quality {}", doc);
            println!("  readiness: {}", report.readiness_score);
            println!(
                "  findings: {} critical, {} warn, {} info",
                report.summary.critical, report.summary.warn, report.summary.info
            );
            println!("ok");
        }

        Commands::Index {
            chunks,
            tenant,
            dataset,
            doc,
            filename,
            source_uri,
        } => {
            let indexer = build_indexer(&config)?;
            let raw_records = records::read_records(&chunks)?;

            let created_at = chrono::Utc::now().to_rfc3339();
            let embedding_model = config.embedding.model.clone().unwrap_or_default();
            let defaults = records::RecordDefaults {
                tenant_id: &tenant,
                dataset_id: &dataset,
                doc_id: &doc,
                source_uri: &source_uri,
                filename: &filename,
                created_at: &created_at,
                embedding_model: &embedding_model,
            };
            let summary = indexer.ingest_document(&defaults, raw_records).await?;

            println!("index {}", doc);
            println!("  replaced chunks: {}", summary.deleted);
            println!("  embedded and stored: {}", summary.processed);
            println!("  skipped (empty text): {}", summary.skipped);
            println!("  batches: {}", summary.batches);
            println!("ok");
        }

        Commands::Search {
            query,
            tenant,
            dataset,
            top_k,
        } => {
            let embedder = build_embedder(&config)?;
            let backend = build_backend(&config)?;

            let vector = embedder.embed(&query).await?;
            let hits = backend.search(&tenant, &dataset, &vector, top_k).await?;

            println!("search \"{}\" ({} hits)", query, hits.len());
            for hit in hits {
                let page = hit.page.map(|p| p.to_string()).unwrap_or_default();
                println!(
                    "  {:.3}  {}  p{} #{}",
                    hit.score, hit.filename, page, hit.chunk_index
                );
                let preview: String = hit.text.chars().take(120).collect();
                println!("         {}", preview);
            }
        }
    }

    Ok(())
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>, PipelineError> {
    let endpoint = config.embedding.endpoint.clone().ok_or_else(|| {
        PipelineError::MissingConfiguration("embedding.endpoint is required".to_string())
    })?;
    let model = config.embedding.model.clone().ok_or_else(|| {
        PipelineError::MissingConfiguration("embedding.model is required".to_string())
    })?;
    Ok(Arc::new(HttpEmbedder::new(
        &endpoint,
        &model,
        config.embedding.timeout_secs,
    )?))
}

fn build_backend(config: &Config) -> Result<Arc<dyn VectorBackend>, PipelineError> {
    let dimension = config.embedding.dims.unwrap_or(0);
    match config.index.backend.as_str() {
        "http" => {
            let http = config.index.http.as_ref().ok_or_else(|| {
                PipelineError::MissingConfiguration("[index.http] section is required".to_string())
            })?;
            Ok(Arc::new(HttpIndexStore::new(
                &http.endpoint,
                &http.index_name,
                dimension,
            )?))
        }
        "postgres" => {
            let postgres = config.index.postgres.as_ref().ok_or_else(|| {
                PipelineError::MissingConfiguration(
                    "[index.postgres] section is required".to_string(),
                )
            })?;
            Ok(Arc::new(PgVectorStore::new(&postgres.url, dimension)?))
        }
        other => Err(PipelineError::MissingConfiguration(format!(
            "unknown index backend: {other}"
        ))),
    }
}

fn build_indexer(config: &Config) -> Result<VectorIndexer, PipelineError> {
    let backend = build_backend(config)?;
    let embedder = build_embedder(config)?;
    VectorIndexer::new(
        backend,
        embedder,
        IndexerOptions {
            dimension: config.embedding.dims.unwrap_or(0),
            batch_size: config.embedding.batch_size,
            concurrency: config.embedding.concurrency,
        },
    )
}
