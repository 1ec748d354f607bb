//! # ragprep
//!
//! Document ingestion and readiness pipeline for multi-tenant retrieval
//! platforms.
//!
//! ragprep segments extracted page text into retrieval-sized chunks,
//! assigns content-addressed identities, detects exact and near-duplicate
//! documents, scores document readiness, and pushes embedded chunks into a
//! vector store with idempotent per-document replace semantics across two
//! interchangeable backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────────┐   ┌───────────────┐
//! │  Pages   │──▶│ Segmenter │──▶│ Chunk Records │──▶│ VectorIndexer │
//! │  (JSON)  │   │ + address │   │   (JSONL)     │   │ embed + store │
//! └──────────┘   └───────────┘   └───────────────┘   └──────┬────────┘
//!       │                                                   │
//!       ▼                                          ┌────────┴────────┐
//! ┌───────────────┐   ┌────────────────┐           ▼                 ▼
//! │ Quality checks│──▶│ QualityReport  │    ┌────────────┐   ┌──────────────┐
//! │ dup + advisory│   │ readiness 0-100│    │ HTTP index │   │ Postgres +   │
//! └───────────────┘   └────────────────┘    │  (bulk)    │   │  pgvector    │
//!                                           └────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`segment`] | Page-text segmentation |
//! | [`address`] | Chunk ids and content hashes |
//! | [`simhash`] | Near-duplicate fingerprinting |
//! | [`classify`] | Domain metadata heuristics |
//! | [`textstats`] | Extraction statistics |
//! | [`catalog`] | Per-tenant file registry seam |
//! | [`quality`] | Duplicate detection and advisory checks |
//! | [`readiness`] | Readiness scoring |
//! | [`records`] | Chunk record construction and JSONL persistence |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector indexing and backend implementations |
//! | [`pipeline`] | Stage orchestration over files |

pub mod address;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod quality;
pub mod readiness;
pub mod records;
pub mod segment;
pub mod simhash;
pub mod textstats;
