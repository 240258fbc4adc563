use std::sync::Arc;

use embedding::{AlignmentError, Embedder, EmbeddingResult};
use serde::Serialize;

use crate::metrics::{MetricsSpan, RetrievalMetrics};
use crate::{RetrievalError, TenantStore};

/// Texts after chunking, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTexts {
    tenant_id: Option<String>,
    texts: Vec<String>,
}

impl PreparedTexts {
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Texts paired 1:1 with their embeddings.
///
/// Can only be built when the counts agree, so a batch that reaches storage
/// is always aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedBatch {
    tenant_id: Option<String>,
    texts: Vec<String>,
    embeddings: EmbeddingResult,
}

impl AlignedBatch {
    pub fn new(
        tenant_id: Option<String>,
        texts: Vec<String>,
        embeddings: EmbeddingResult,
    ) -> Result<Self, AlignmentError> {
        embeddings.ensure_len("aligned batch", texts.len())?;
        Ok(Self {
            tenant_id,
            texts,
            embeddings,
        })
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn embeddings(&self) -> &EmbeddingResult {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn into_parts(self) -> (Option<String>, Vec<String>, EmbeddingResult) {
        (self.tenant_id, self.texts, self.embeddings)
    }
}

/// Result of [`IngestPipeline::ingest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    /// One row per stored (or, with `save == false`, prepared) text.
    pub embeddings: EmbeddingResult,
    pub inserted: usize,
}

/// chunk → embed → store, with a typed value between each stage.
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<TenantStore>,
    metrics: Option<Arc<dyn RetrievalMetrics>>,
}

impl IngestPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<TenantStore>) -> Self {
        Self {
            embedder,
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<dyn RetrievalMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn prepare(&self, tenant_id: Option<&str>, texts: Vec<String>) -> PreparedTexts {
        PreparedTexts {
            tenant_id: tenant_id.map(str::to_string),
            texts: self.store.prepare_texts(tenant_id, texts),
        }
    }

    pub async fn embed(&self, prepared: PreparedTexts) -> Result<AlignedBatch, RetrievalError> {
        let embeddings = if prepared.is_empty() {
            EmbeddingResult::default()
        } else {
            self.embedder.embed(&prepared.texts).await?
        };
        Ok(AlignedBatch::new(
            prepared.tenant_id,
            prepared.texts,
            embeddings,
        )?)
    }

    pub async fn store(&self, batch: AlignedBatch) -> Result<usize, RetrievalError> {
        self.store.insert_batch(batch).await
    }

    /// Run all stages. With `save == false` the texts are embedded but
    /// nothing is written.
    pub async fn ingest(
        &self,
        tenant_id: Option<&str>,
        texts: Vec<String>,
        save: bool,
    ) -> Result<IngestOutcome, RetrievalError> {
        let span = MetricsSpan::start(self.metrics.as_ref());
        let input_count = texts.len();
        let result = self.run(tenant_id, texts, save).await;

        if let Some(span) = span {
            span.record_ingest(input_count, result.as_ref().ok().map(|o| o.inserted));
        }
        match &result {
            Ok(outcome) => tracing::info!(
                texts = input_count,
                chunks = outcome.embeddings.len(),
                inserted = outcome.inserted,
                save,
                "ingest complete"
            ),
            Err(err) => tracing::warn!(texts = input_count, error = %err, "ingest failed"),
        }
        result
    }

    async fn run(
        &self,
        tenant_id: Option<&str>,
        texts: Vec<String>,
        save: bool,
    ) -> Result<IngestOutcome, RetrievalError> {
        let batch = self.embed(self.prepare(tenant_id, texts)).await?;
        if !save {
            return Ok(IngestOutcome {
                embeddings: batch.into_parts().2,
                inserted: 0,
            });
        }
        let embeddings = batch.embeddings().clone();
        let inserted = self.store(batch).await?;
        Ok(IngestOutcome {
            embeddings,
            inserted,
        })
    }
}
