//! # Dual embeddings
//!
//! Data model and backends for documents represented twice: a fixed-width
//! dense vector for semantic similarity and a sparse term-weight map for
//! lexical overlap.
//!
//! - [`EmbeddingData`] / [`EmbeddingResult`]: one row per input text, in input
//!   order. Every consumer downstream relies on that alignment.
//! - [`Embedder`]: the capability every backend implements.
//! - Backends: [`StubEmbedder`] (offline, deterministic), [`RemoteEmbedder`]
//!   (HTTP model server), [`DenseOnlyEmbedder`] (drops sparse weights) and
//!   [`FusionEmbedder`] (dense from one model, sparse from another).
//! - [`build_embedder`] turns an [`EmbeddingConfig`] into a ready backend.
//!
//! ```
//! use embedding::{fuse, EmbeddingData, EmbeddingResult};
//!
//! let dense = EmbeddingResult::new(vec![EmbeddingData::dense_only(vec![1.0, 0.0])]);
//! let sparse = EmbeddingResult::new(vec![EmbeddingData::new(
//!     vec![0.0, 0.0],
//!     [(17, 0.4)].into_iter().collect(),
//! )]);
//!
//! let fused = fuse(dense, sparse).unwrap();
//! assert_eq!(fused.embeddings[0].dense_vector, vec![1.0, 0.0]);
//! assert_eq!(fused.embeddings[0].sparse_weights[&17], 0.4);
//! ```

mod api;
mod config;
mod embedder;
mod error;
mod stub;
mod types;

pub use api::{parse_embeddings, ApiProvider, RemoteEmbedder};
pub use config::{build_embedder, EmbeddingConfig, FusionConfig, DEFAULT_DIMENSION};
pub use embedder::{DenseOnlyEmbedder, Embedder, FusionEmbedder};
pub use error::{AlignmentError, EmbeddingError};
pub use stub::{make_stub_embedding, StubEmbedder, SPARSE_VOCAB_SIZE};
pub use types::{fuse, EmbeddingData, EmbeddingResult, SparseVector};
