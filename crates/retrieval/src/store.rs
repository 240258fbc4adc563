use std::sync::Arc;

use chunk::{chunk_with_config, ChunkConfig, TENANT_MAX_LENGTH};
use embedding::EmbeddingResult;
use index::{Filter, NewRecord, VectorStore};

use crate::pipeline::AlignedBatch;
use crate::RetrievalError;

/// Maps tenant-scoped (text, embedding) pairs onto the two collections.
///
/// Records with a tenant go to the tenant collection and are only visible to
/// searches filtered on that exact tenant id. Records without one go to the
/// global collection. The two are never searched together.
pub struct TenantStore {
    global: Arc<dyn VectorStore>,
    tenant: Arc<dyn VectorStore>,
    chunking: ChunkConfig,
}

impl TenantStore {
    pub fn new(global: Arc<dyn VectorStore>, tenant: Arc<dyn VectorStore>) -> Self {
        Self {
            global,
            tenant,
            chunking: ChunkConfig::new(TENANT_MAX_LENGTH),
        }
    }

    /// Chunking applied to tenant-scoped texts.
    pub fn with_chunking(mut self, chunking: ChunkConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn chunking(&self) -> &ChunkConfig {
        &self.chunking
    }

    /// The collection a tenant's records live in.
    pub fn collection(&self, tenant_id: Option<&str>) -> &Arc<dyn VectorStore> {
        match tenant_id {
            Some(_) => &self.tenant,
            None => &self.global,
        }
    }

    /// `tenant_id == "<tenant>"`, or no filter for the global collection.
    pub fn filter(&self, tenant_id: Option<&str>) -> Option<Filter> {
        tenant_id.map(Filter::tenant)
    }

    /// Texts as they will be stored: chunked when a tenant is given,
    /// untouched otherwise.
    pub fn prepare_texts(&self, tenant_id: Option<&str>, texts: Vec<String>) -> Vec<String> {
        match tenant_id {
            Some(_) => chunk_with_config(&texts, &self.chunking),
            None => texts,
        }
    }

    /// Insert one record per (text, embedding) pair and return how many were
    /// written.
    ///
    /// With a tenant, `texts` are chunked first and `embeddings` must already
    /// line up with the chunks. Any count mismatch fails before anything is
    /// written.
    pub async fn insert(
        &self,
        tenant_id: Option<&str>,
        texts: Vec<String>,
        embeddings: EmbeddingResult,
    ) -> Result<usize, RetrievalError> {
        let texts = self.prepare_texts(tenant_id, texts);
        let batch = AlignedBatch::new(tenant_id.map(str::to_string), texts, embeddings)?;
        self.insert_batch(batch).await
    }

    /// Write an already aligned batch as-is.
    pub async fn insert_batch(&self, batch: AlignedBatch) -> Result<usize, RetrievalError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let (tenant_id, texts, embeddings) = batch.into_parts();
        let records: Vec<NewRecord> = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, row)| NewRecord {
                text,
                tenant_id: tenant_id.clone(),
                sparse_vector: row.sparse_weights,
                dense_vector: row.dense_vector,
            })
            .collect();

        let collection = self.collection(tenant_id.as_deref());
        let ids = collection
            .insert(records)
            .await
            .map_err(RetrievalError::Storage)?;

        tracing::info!(
            collection = %collection.schema().name,
            tenant = tenant_id.as_deref().unwrap_or("-"),
            inserted = ids.len(),
            "records stored"
        );
        Ok(ids.len())
    }

    pub async fn flush(&self) -> Result<(), RetrievalError> {
        self.global.flush().await.map_err(RetrievalError::Storage)?;
        self.tenant.flush().await.map_err(RetrievalError::Storage)
    }

    /// Close both collections. Both are attempted; the first error wins.
    pub async fn close(&self) -> Result<(), RetrievalError> {
        let global = self.global.close().await;
        let tenant = self.tenant.close().await;
        global.and(tenant).map_err(RetrievalError::Storage)
    }
}
