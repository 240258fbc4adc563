use std::sync::Arc;
use std::time::Instant;

use embedding::{AlignmentError, Embedder, EmbeddingData};
use index::{AnnRequest, Hit, WeightedRanker};

use crate::metrics::{MetricsSpan, RetrievalMetrics};
use crate::{FusionStrategy, RetrievalError, SearchMode, SearchRequest, TenantStore};

/// Query-side half of the service: embed the query, ask the store, fuse.
pub struct HybridSearcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<TenantStore>,
    fusion: FusionStrategy,
    metrics: Option<Arc<dyn RetrievalMetrics>>,
}

impl HybridSearcher {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<TenantStore>) -> Self {
        Self {
            embedder,
            store,
            fusion: FusionStrategy::default(),
            metrics: None,
        }
    }

    pub fn with_fusion(mut self, fusion: FusionStrategy) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<dyn RetrievalMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn fusion(&self) -> FusionStrategy {
        self.fusion
    }

    /// Ranked texts, best first, at most `top_k` of them.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<String>, RetrievalError> {
        let hits = self.search_hits(request).await?;
        Ok(hits.into_iter().map(|hit| hit.text).collect())
    }

    /// Weighted dense + sparse search.
    pub async fn hybrid_search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        dense_weight: f32,
        sparse_weight: f32,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let request = SearchRequest::new(query)
            .with_tenant(tenant_id.map(str::to_string))
            .with_weights(dense_weight, sparse_weight)
            .with_top_k(top_k);
        self.search(&request).await
    }

    pub async fn dense_search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let request = SearchRequest::new(query)
            .with_tenant(tenant_id.map(str::to_string))
            .with_top_k(top_k)
            .with_mode(SearchMode::Dense);
        self.search(&request).await
    }

    pub async fn sparse_search(
        &self,
        query: &str,
        tenant_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let request = SearchRequest::new(query)
            .with_tenant(tenant_id.map(str::to_string))
            .with_top_k(top_k)
            .with_mode(SearchMode::Sparse);
        self.search(&request).await
    }

    /// Same as [`HybridSearcher::search`] but keeps ids and fused scores.
    pub async fn search_hits(&self, request: &SearchRequest) -> Result<Vec<Hit>, RetrievalError> {
        if request.top_k == 0 {
            return Ok(Vec::new());
        }
        request.weights.validate()?;

        let span = MetricsSpan::start(self.metrics.as_ref());
        let started = Instant::now();
        let result = self.run(request).await;

        if let Some(span) = span {
            span.record_search(request.mode, result.as_ref().ok().map(Vec::len));
        }
        match &result {
            Ok(hits) => tracing::info!(
                mode = ?request.mode,
                tenant = request.tenant_id.as_deref().unwrap_or("-"),
                top_k = request.top_k,
                hits = hits.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "search complete"
            ),
            Err(err) => tracing::warn!(mode = ?request.mode, error = %err, "search failed"),
        }
        result
    }

    async fn run(&self, request: &SearchRequest) -> Result<Vec<Hit>, RetrievalError> {
        let query = self.embed_query(&request.query).await?;
        let tenant_id = request.tenant_id.as_deref();
        let collection = self.store.collection(tenant_id);
        let filter = self.store.filter(tenant_id);
        let limit = request.top_k;

        match request.mode {
            SearchMode::Dense => collection
                .search(AnnRequest::dense(query.dense_vector, limit).with_filter(filter))
                .await
                .map_err(RetrievalError::Search),
            SearchMode::Sparse => collection
                .search(AnnRequest::sparse(query.sparse_weights, limit).with_filter(filter))
                .await
                .map_err(RetrievalError::Search),
            SearchMode::Hybrid => {
                let ranker = WeightedRanker::hybrid(request.weights.dense, request.weights.sparse)
                    .map_err(|err| RetrievalError::InvalidRequest(err.to_string()))?;
                let dense = AnnRequest::dense(query.dense_vector, limit).with_filter(filter.clone());
                let sparse = AnnRequest::sparse(query.sparse_weights, limit).with_filter(filter);

                match self.fusion {
                    FusionStrategy::Client => {
                        let (dense_hits, sparse_hits) =
                            tokio::try_join!(collection.search(dense), collection.search(sparse))
                                .map_err(RetrievalError::Search)?;
                        tracing::debug!(
                            dense = dense_hits.len(),
                            sparse = sparse_hits.len(),
                            "fusing candidate lists"
                        );
                        ranker
                            .fuse(&[dense_hits, sparse_hits], limit)
                            .map_err(RetrievalError::Search)
                    }
                    FusionStrategy::Store => collection
                        .hybrid_search(vec![dense, sparse], &ranker, limit)
                        .await
                        .map_err(RetrievalError::Search),
                }
            }
        }
    }

    async fn embed_query(&self, query: &str) -> Result<EmbeddingData, RetrievalError> {
        let texts = [query.to_string()];
        let result = self.embedder.embed(&texts).await?;
        result.ensure_len("query embedding", 1)?;
        result
            .into_inner()
            .pop()
            .ok_or_else(|| RetrievalError::Alignment(AlignmentError::new("query embedding", 1, 0)))
    }
}
