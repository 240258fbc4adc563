//! # Tenant-scoped hybrid retrieval
//!
//! Glue between an [`embedding::Embedder`] and two [`index::VectorStore`]
//! collections (global and tenant-scoped).
//!
//! Ingestion is an explicit staged pipeline:
//!
//! ```text
//! texts ──prepare──▶ PreparedTexts ──embed──▶ AlignedBatch ──store──▶ inserted count
//!        (chunk when                 (1:1 text/embedding,
//!         tenant given)               checked on construction)
//! ```
//!
//! Search embeds the query once, joins a dense and a sparse ANN request
//! with `tokio::try_join!` (the in-process [`index::VectorIndex`] answers
//! them one after the other; remote stores overlap them) and merges them
//! with a [`index::WeightedRanker`]: union of
//! both candidate lists, `dense_weight * dense_score + sparse_weight *
//! sparse_score`, exact ties resolved in favour of the dense ranking.
//! [`SearchMode::Dense`] and [`SearchMode::Sparse`] skip the unused request
//! and the fusion step.

mod error;
mod metrics;
mod pipeline;
mod search;
mod store;
mod types;

pub use error::RetrievalError;
pub use metrics::RetrievalMetrics;
pub use pipeline::{AlignedBatch, IngestOutcome, IngestPipeline, PreparedTexts};
pub use search::HybridSearcher;
pub use store::TenantStore;
pub use types::{
    FusionStrategy, SearchMode, SearchRequest, SearchWeights, DEFAULT_DENSE_WEIGHT,
    DEFAULT_SPARSE_WEIGHT, DEFAULT_TOP_K,
};
