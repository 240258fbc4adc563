use async_trait::async_trait;
use fxhash::hash64;

use crate::embedder::Embedder;
use crate::error::EmbeddingError;
use crate::types::{EmbeddingData, EmbeddingResult, SparseVector};

/// Vocabulary size of the XLM-RoBERTa tokenizer that BGE-M3 term ids index into.
pub const SPARSE_VOCAB_SIZE: u64 = 250_002;

/// Deterministic offline embedder.
///
/// Dense vectors are signed feature hashes of lower-cased word tokens, so
/// texts sharing words score higher under inner product. Sparse weights are
/// relative term frequencies keyed by a hashed term id.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: usize,
    normalize: bool,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn name(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| make_stub_embedding(text, self.dimension, self.normalize))
            .collect())
    }
}

/// Embed one text without any model.
pub fn make_stub_embedding(text: &str, dimension: usize, normalize: bool) -> EmbeddingData {
    let dimension = dimension.max(1);
    let mut dense = vec![0.0f32; dimension];
    let mut sparse = SparseVector::new();

    let tokens = tokenize(text);
    for token in &tokens {
        let h = hash64(token.as_str());
        let slot = (h % dimension as u64) as usize;
        let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
        dense[slot] += sign;

        let term = (h % SPARSE_VOCAB_SIZE) as u32;
        *sparse.entry(term).or_insert(0.0) += 1.0;
    }

    if !tokens.is_empty() {
        let total = tokens.len() as f32;
        for weight in sparse.values_mut() {
            *weight /= total;
        }
    }

    let mut data = EmbeddingData::new(dense, sparse);
    if normalize {
        data.normalize_dense();
    }
    data
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
