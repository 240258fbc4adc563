use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::types::{fuse, EmbeddingResult};

/// Anything that turns texts into dual embeddings.
///
/// Implementations must return exactly one row per input text, in input
/// order, each with a dense vector of [`Embedder::dimension`] values.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Dense dimensionality of every produced row.
    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, EmbeddingError>;

    /// Release model or connection resources. Further calls may fail.
    async fn close(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }
}

/// Drops the lexical half of another embedder's output.
pub struct DenseOnlyEmbedder {
    inner: Arc<dyn Embedder>,
}

impl DenseOnlyEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Embedder for DenseOnlyEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, EmbeddingError> {
        let mut result = self.inner.embed(texts).await?;
        for row in &mut result.embeddings {
            row.sparse_weights.clear();
        }
        Ok(result)
    }

    async fn close(&self) -> Result<(), EmbeddingError> {
        self.inner.close().await
    }
}

/// Dense vectors from one model, sparse weights from another.
///
/// Both models see the same texts and run concurrently; the two results are
/// combined row by row with [`fuse`].
pub struct FusionEmbedder {
    dense: Arc<dyn Embedder>,
    sparse: Arc<dyn Embedder>,
    name: String,
}

impl FusionEmbedder {
    pub fn new(dense: Arc<dyn Embedder>, sparse: Arc<dyn Embedder>) -> Self {
        let name = format!("{}+{}", dense.name(), sparse.name());
        Self {
            dense,
            sparse,
            name,
        }
    }
}

#[async_trait]
impl Embedder for FusionEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dense.dimension()
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, EmbeddingError> {
        let (dense, sparse) = tokio::try_join!(self.dense.embed(texts), self.sparse.embed(texts))?;
        dense.ensure_len("dense model", texts.len())?;
        sparse.ensure_len("sparse model", texts.len())?;
        Ok(fuse(dense, sparse)?)
    }

    async fn close(&self) -> Result<(), EmbeddingError> {
        let dense = self.dense.close().await;
        let sparse = self.sparse.close().await;
        dense.and(sparse)
    }
}
