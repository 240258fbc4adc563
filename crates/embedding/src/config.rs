use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{ApiProvider, RemoteEmbedder};
use crate::embedder::{DenseOnlyEmbedder, Embedder, FusionEmbedder};
use crate::error::EmbeddingError;
use crate::stub::StubEmbedder;

/// Dense dimensionality of BGE-M3, the reference model.
pub const DEFAULT_DIMENSION: usize = 1024;

/// How to build an [`Embedder`].
///
/// `mode` selects the backend: `stub` (offline, deterministic), `api` (HTTP
/// model server) or `fusion` (dense and sparse from two nested configs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub api_url: Option<String>,

    /// Sent verbatim as the `Authorization` header.
    #[serde(default)]
    pub api_auth_header: Option<String>,

    #[serde(default)]
    pub api_provider: ApiProvider,

    #[serde(default = "default_timeout_secs")]
    pub api_timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Discard sparse weights, as a dense-only model would.
    #[serde(default)]
    pub dense_only: bool,

    #[serde(default)]
    pub fusion: Option<FusionConfig>,
}

/// Sources for the two halves of a fused embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub dense: Box<EmbeddingConfig>,
    pub sparse: Box<EmbeddingConfig>,
}

impl EmbeddingConfig {
    pub fn stub(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EmbeddingError> {
        const MODES: [&str; 3] = ["stub", "api", "fusion"];
        if !MODES.contains(&self.mode.as_str()) {
            return Err(EmbeddingError::InvalidConfig(format!(
                "mode must be one of: {MODES:?}"
            )));
        }
        if self.dimension == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "dimension must be >= 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "batch_size must be >= 1".into(),
            ));
        }
        if self.mode == "api" && self.api_url.is_none() {
            return Err(EmbeddingError::InvalidConfig(
                "api_url is required when mode is 'api'".into(),
            ));
        }
        if self.mode == "fusion" {
            let fusion = self.fusion.as_ref().ok_or_else(|| {
                EmbeddingError::InvalidConfig("fusion section is required when mode is 'fusion'".into())
            })?;
            fusion.dense.validate()?;
            fusion.sparse.validate()?;
            if fusion.dense.dimension != self.dimension {
                return Err(EmbeddingError::InvalidConfig(format!(
                    "fusion.dense.dimension ({}) must equal dimension ({})",
                    fusion.dense.dimension, self.dimension
                )));
            }
        }
        Ok(())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            model_name: default_model_name(),
            dimension: default_dimension(),
            api_url: None,
            api_auth_header: None,
            api_provider: ApiProvider::default(),
            api_timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
            normalize: true,
            dense_only: false,
            fusion: None,
        }
    }
}

/// Validate `cfg` and construct the embedder it describes.
pub fn build_embedder(cfg: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    cfg.validate()?;

    let embedder: Arc<dyn Embedder> = match cfg.mode.as_str() {
        "api" => {
            let url = cfg.api_url.clone().unwrap_or_default();
            let remote = RemoteEmbedder::new(
                url,
                cfg.model_name.clone(),
                cfg.dimension,
                Duration::from_secs(cfg.api_timeout_secs),
            )?
            .with_auth_header(cfg.api_auth_header.clone())
            .with_provider(cfg.api_provider)
            .with_batch_size(cfg.batch_size)
            .with_normalize(cfg.normalize);
            Arc::new(remote)
        }
        "fusion" => {
            let fusion = cfg.fusion.as_ref().ok_or_else(|| {
                EmbeddingError::InvalidConfig("fusion section missing".into())
            })?;
            let dense = build_embedder(&fusion.dense)?;
            let sparse = build_embedder(&fusion.sparse)?;
            Arc::new(FusionEmbedder::new(dense, sparse))
        }
        _ => Arc::new(StubEmbedder::new(cfg.dimension).with_normalize(cfg.normalize)),
    };

    tracing::info!(
        mode = %cfg.mode,
        model = %embedder.name(),
        dimension = embedder.dimension(),
        dense_only = cfg.dense_only,
        "embedder ready"
    );

    if cfg.dense_only {
        Ok(Arc::new(DenseOnlyEmbedder::new(embedder)))
    } else {
        Ok(embedder)
    }
}

fn default_mode() -> String {
    "stub".to_string()
}

fn default_model_name() -> String {
    "bge-m3".to_string()
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}
