use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::embedder::Embedder;
use crate::error::{AlignmentError, EmbeddingError};
use crate::types::{EmbeddingData, EmbeddingResult, SparseVector};

/// Request body flavour expected by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    /// `{"texts": [...]}` to a dense + sparse service.
    #[default]
    Hybrid,
    /// `{"input": [...], "model": "..."}` to an OpenAI-compatible endpoint.
    #[serde(rename = "openai")]
    OpenAi,
}

/// Embedder backed by an HTTP model server.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
    auth_header: Option<String>,
    provider: ApiProvider,
    model_name: String,
    dimension: usize,
    batch_size: usize,
    normalize: bool,
    closed: AtomicBool,
}

impl RemoteEmbedder {
    pub fn new(
        url: impl Into<String>,
        model_name: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            auth_header: None,
            provider: ApiProvider::default(),
            model_name: model_name.into(),
            dimension,
            batch_size: 50,
            normalize: false,
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_auth_header(mut self, header: Option<String>) -> Self {
        self.auth_header = header;
        self
    }

    pub fn with_provider(mut self, provider: ApiProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    fn request_body(&self, texts: &[String]) -> Value {
        match self.provider {
            ApiProvider::Hybrid => json!({ "texts": texts, "model": self.model_name }),
            ApiProvider::OpenAi => json!({ "input": texts, "model": self.model_name }),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingData>, EmbeddingError> {
        let mut request = self.client.post(&self.url).json(&self.request_body(texts));
        if let Some(header) = &self.auth_header {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        let rows = parse_embeddings(&value)?;
        AlignmentError::check("remote batch", texts.len(), rows.len())?;
        validate_rows(&rows, self.dimension)?;
        Ok(rows)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, EmbeddingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EmbeddingError::Unavailable(format!(
                "{} has been closed",
                self.model_name
            )));
        }
        let mut rows = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            rows.extend(self.embed_batch(batch).await?);
        }
        if self.normalize {
            for row in &mut rows {
                row.normalize_dense();
            }
        }
        tracing::debug!(
            model = %self.model_name,
            texts = texts.len(),
            "remote embedding complete"
        );
        Ok(EmbeddingResult::new(rows))
    }

    async fn close(&self) -> Result<(), EmbeddingError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Accepts the three response shapes seen in deployment:
///
/// - `{"embeddings": [{"dense_vecs": [..], "sparse_vecs": {"id": w}}]}`
/// - `{"dense_vecs": [[..]], "lexical_weights": [{"id": w}]}`
/// - `{"data": [{"embedding": [..]}]}` (dense only)
pub fn parse_embeddings(value: &Value) -> Result<Vec<EmbeddingData>, EmbeddingError> {
    if let Some(rows) = value.get("embeddings") {
        return serde_json::from_value(rows.clone())
            .map_err(|e| EmbeddingError::InvalidResponse(format!("embeddings: {e}")));
    }

    if let Some(dense_rows) = value.get("dense_vecs") {
        let dense: Vec<Vec<f32>> = serde_json::from_value(dense_rows.clone())
            .map_err(|e| EmbeddingError::InvalidResponse(format!("dense_vecs: {e}")))?;
        let sparse = match value.get("lexical_weights") {
            Some(Value::Null) | None => vec![SparseVector::new(); dense.len()],
            Some(lexical) => parse_lexical_weights(lexical)?,
        };
        AlignmentError::check("lexical_weights", dense.len(), sparse.len())?;
        return Ok(dense
            .into_iter()
            .zip(sparse)
            .map(|(d, s)| EmbeddingData::new(d, s))
            .collect());
    }

    if let Some(Value::Array(items)) = value.get("data") {
        return items
            .iter()
            .map(|item| -> Result<EmbeddingData, EmbeddingError> {
                let embedding = item.get("embedding").ok_or_else(|| {
                    EmbeddingError::InvalidResponse("data item without embedding".into())
                })?;
                serde_json::from_value::<Vec<f32>>(embedding.clone())
                    .map(EmbeddingData::dense_only)
                    .map_err(|e| EmbeddingError::InvalidResponse(format!("data: {e}")))
            })
            .collect();
    }

    Err(EmbeddingError::InvalidResponse(
        "expected one of `embeddings`, `dense_vecs` or `data`".into(),
    ))
}

fn parse_lexical_weights(value: &Value) -> Result<Vec<SparseVector>, EmbeddingError> {
    let rows = value
        .as_array()
        .ok_or_else(|| EmbeddingError::InvalidResponse("lexical_weights must be a list".into()))?;
    rows.iter()
        .map(|row| -> Result<SparseVector, EmbeddingError> {
            let object = row.as_object().ok_or_else(|| {
                EmbeddingError::InvalidResponse("lexical_weights rows must be objects".into())
            })?;
            object
                .iter()
                .map(|(term, weight)| -> Result<(u32, f32), EmbeddingError> {
                    let id = term.parse::<u32>().map_err(|_| {
                        EmbeddingError::InvalidResponse(format!("term id `{term}` is not numeric"))
                    })?;
                    let weight = weight.as_f64().ok_or_else(|| {
                        EmbeddingError::InvalidResponse(format!("weight for term {id} is not a number"))
                    })?;
                    Ok((id, weight as f32))
                })
                .collect()
        })
        .collect()
}

fn validate_rows(rows: &[EmbeddingData], dimension: usize) -> Result<(), EmbeddingError> {
    for row in rows {
        if row.dimension() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: row.dimension(),
            });
        }
        if let Some((term, weight)) = row.invalid_sparse_weight() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "sparse weight {weight} for term {term} must be finite and non-negative"
            )));
        }
    }
    Ok(())
}
