use serde::{Deserialize, Serialize};

use crate::RetrievalError;

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_DENSE_WEIGHT: f32 = 1.0;
pub const DEFAULT_SPARSE_WEIGHT: f32 = 0.7;

/// Which similarity signals a search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Dense,
    Sparse,
}

/// Where hybrid results are fused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Dense and sparse requests joined with `tokio::try_join!`, fused in-process.
    #[default]
    Client,
    /// One `hybrid_search` call; the store fuses.
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    #[serde(default = "default_dense_weight")]
    pub dense: f32,
    #[serde(default = "default_sparse_weight")]
    pub sparse: f32,
}

fn default_dense_weight() -> f32 {
    DEFAULT_DENSE_WEIGHT
}

fn default_sparse_weight() -> f32 {
    DEFAULT_SPARSE_WEIGHT
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            dense: DEFAULT_DENSE_WEIGHT,
            sparse: DEFAULT_SPARSE_WEIGHT,
        }
    }
}

impl SearchWeights {
    pub fn new(dense: f32, sparse: f32) -> Self {
        Self { dense, sparse }
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        for (name, w) in [("dense_weight", self.dense), ("sparse_weight", self.sparse)] {
            if !w.is_finite() || w < 0.0 {
                return Err(RetrievalError::InvalidRequest(format!(
                    "{name} must be finite and non-negative, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// One query against the retrieval layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub weights: SearchWeights,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub mode: SearchMode,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            tenant_id: None,
            weights: SearchWeights::default(),
            top_k: DEFAULT_TOP_K,
            mode: SearchMode::Hybrid,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_weights(mut self, dense: f32, sparse: f32) -> Self {
        self.weights = SearchWeights::new(dense, sparse);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_deployed_ratio() {
        let req = SearchRequest::new("q");
        assert_eq!(req.top_k, 10);
        assert_eq!(req.weights, SearchWeights::new(1.0, 0.7));
        assert_eq!(req.mode, SearchMode::Hybrid);
    }

    #[test]
    fn weights_must_be_finite_and_non_negative() {
        assert!(SearchWeights::new(0.0, 0.0).validate().is_ok());
        assert!(SearchWeights::new(-1.0, 0.5).validate().is_err());
        assert!(SearchWeights::new(1.0, f32::INFINITY).validate().is_err());
    }
}
