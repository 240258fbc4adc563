//! Workspace umbrella crate for hybrid dense + sparse retrieval (HRAG).
//!
//! [`HybridRag`] owns the process-wide resources (one embedder, a global and a
//! tenant-scoped collection) and exposes ingestion and search over them. It
//! is built explicitly with [`HybridRag::init`] and released with
//! [`HybridRag::close`]; nothing is held in statics.
//!
//! ```no_run
//! use hrag::{HragConfig, HybridRag};
//!
//! # async fn run() -> Result<(), hrag::HragError> {
//! let rag = HybridRag::init(HragConfig::stub(256))?;
//! rag.ingest(None, vec!["cats are felines".into()], true).await?;
//! let texts = rag.search("feline", None, Some(3)).await?;
//! assert_eq!(texts[0], "cats are felines");
//! rag.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use chunk::{
    ChunkConfig, ChunkConfigError, DEFAULT_CHUNK_OVERLAP, TENANT_MAX_LENGTH, TextSplitter, chunk,
    chunk_with_config,
};
pub use config::{
    ChunkingYamlConfig, ConfigLoadError, HragConfig, IndexYamlConfig, SearchYamlConfig,
};
pub use embedding::{
    AlignmentError, Embedder, EmbeddingConfig, EmbeddingData, EmbeddingError, EmbeddingResult,
    FusionEmbedder, SparseVector, StubEmbedder, build_embedder, fuse,
};
pub use index::{
    AnnRequest, BackendConfig, CollectionSchema, Filter, Hit, IndexConfig, IndexError, NewRecord,
    StoredRecord, VectorField, VectorIndex, VectorStore, WeightedRanker,
};
pub use retrieval::{
    AlignedBatch, FusionStrategy, HybridSearcher, IngestOutcome, IngestPipeline, PreparedTexts,
    RetrievalError, RetrievalMetrics, SearchMode, SearchRequest, SearchWeights, TenantStore,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Errors surfaced by [`HybridRag`].
#[derive(Debug, Error)]
pub enum HragError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("embedder setup failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("collection setup failed: {0}")]
    Index(#[from] IndexError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error("service is closed")]
    Closed,
}

/// The retrieval service: embedder, both collections, pipeline and searcher.
pub struct HybridRag {
    config: HragConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<TenantStore>,
    pipeline: IngestPipeline,
    searcher: HybridSearcher,
    closed: AtomicBool,
}

impl HybridRag {
    /// Build the embedder and open both collections described by `config`.
    pub fn init(config: HragConfig) -> Result<Self, HragError> {
        Self::init_with_metrics(config, None)
    }

    pub fn init_with_metrics(
        config: HragConfig,
        metrics: Option<Arc<dyn RetrievalMetrics>>,
    ) -> Result<Self, HragError> {
        config.validate()?;
        let embedder = build_embedder(&config.embedding)?;
        let (global_cfg, tenant_cfg) = config.collection_configs();
        let global: Arc<dyn VectorStore> = Arc::new(VectorIndex::new(global_cfg)?);
        let tenant: Arc<dyn VectorStore> = Arc::new(VectorIndex::new(tenant_cfg)?);
        Self::from_parts(config, embedder, global, tenant, metrics)
    }

    /// Assemble the service from already constructed collaborators.
    ///
    /// The embedder's dimension must match both collections.
    pub fn from_parts(
        config: HragConfig,
        embedder: Arc<dyn Embedder>,
        global: Arc<dyn VectorStore>,
        tenant: Arc<dyn VectorStore>,
        metrics: Option<Arc<dyn RetrievalMetrics>>,
    ) -> Result<Self, HragError> {
        for collection in [&global, &tenant] {
            let schema = collection.schema();
            if schema.dimension != embedder.dimension() {
                return Err(HragError::Index(IndexError::DimensionMismatch {
                    expected: schema.dimension,
                    actual: embedder.dimension(),
                }));
            }
        }

        let store = Arc::new(
            TenantStore::new(global, tenant).with_chunking(config.chunking.chunk_config()),
        );
        let pipeline =
            IngestPipeline::new(embedder.clone(), store.clone()).with_metrics(metrics.clone());
        let searcher = HybridSearcher::new(embedder.clone(), store.clone())
            .with_fusion(config.search.fusion)
            .with_metrics(metrics);

        tracing::info!(
            embedder = %embedder.name(),
            dimension = embedder.dimension(),
            fusion = ?config.search.fusion,
            "hybrid retrieval service ready"
        );

        Ok(Self {
            config,
            embedder,
            store,
            pipeline,
            searcher,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &HragConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<TenantStore> {
        &self.store
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), HragError> {
        if self.closed.load(Ordering::Acquire) {
            Err(HragError::Closed)
        } else {
            Ok(())
        }
    }

    /// Chunk (tenant only), embed and optionally store `texts`.
    pub async fn ingest(
        &self,
        tenant_id: Option<&str>,
        texts: Vec<String>,
        save: bool,
    ) -> Result<IngestOutcome, HragError> {
        self.ensure_open()?;
        Ok(self.pipeline.ingest(tenant_id, texts, save).await?)
    }

    /// Hybrid search with the configured weights. `limit` defaults to
    /// `search.default_top_k`.
    pub async fn search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<String>, HragError> {
        let weights = self.config.search.weights();
        let request = SearchRequest::new(query)
            .with_tenant(tenant_id.map(str::to_string))
            .with_weights(weights.dense, weights.sparse)
            .with_top_k(limit.unwrap_or(self.config.search.default_top_k));
        self.search_with(&request).await
    }

    pub async fn search_with(&self, request: &SearchRequest) -> Result<Vec<String>, HragError> {
        self.ensure_open()?;
        Ok(self.searcher.search(request).await?)
    }

    pub async fn hybrid_search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        dense_weight: f32,
        sparse_weight: f32,
        top_k: usize,
    ) -> Result<Vec<String>, HragError> {
        self.ensure_open()?;
        Ok(self
            .searcher
            .hybrid_search(query, tenant_id, dense_weight, sparse_weight, top_k)
            .await?)
    }

    pub async fn dense_search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<String>, HragError> {
        self.ensure_open()?;
        Ok(self.searcher.dense_search(query, tenant_id, top_k).await?)
    }

    pub async fn sparse_search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<String>, HragError> {
        self.ensure_open()?;
        Ok(self.searcher.sparse_search(query, tenant_id, top_k).await?)
    }

    /// Flush and close both collections, then the embedder. Later calls
    /// return [`HragError::Closed`]; closing twice is a no-op.
    pub async fn close(&self) -> Result<(), HragError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let stored = self.store.close().await;
        let embedder = self.embedder.close().await;
        tracing::info!("hybrid retrieval service closed");
        stored?;
        embedder?;
        Ok(())
    }
}
