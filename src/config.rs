//! YAML configuration for the retrieval service.
//!
//! One file describes every stage: how texts are embedded, how tenant texts
//! are chunked, where the two collections live and how searches are fused.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "production"
//!
//! embedding:
//!   mode: "api"
//!   model_name: "bge-m3"
//!   dimension: 1024
//!   api_url: "http://embedder:8000/embed"
//!   api_provider: "hybrid"
//!   batch_size: 50
//!
//! chunking:
//!   tenant_max_length: 2000
//!   overlap: 100
//!
//! index:
//!   backend: "redb"
//!   path: "/var/lib/hrag"
//!   compression: "zstd"
//!
//! search:
//!   dense_weight: 1.0
//!   sparse_weight: 0.7
//!   default_top_k: 10
//!   fusion: "client"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chunk::{ChunkConfig, DEFAULT_CHUNK_OVERLAP, TENANT_MAX_LENGTH};
use embedding::EmbeddingConfig;
use index::{
    BackendConfig, CollectionSchema, CompressionCodec, CompressionConfig, IndexConfig,
    DEFAULT_COLLECTION, MAX_TENANT_LENGTH, MAX_TEXT_LENGTH, TENANT_COLLECTION,
};
use retrieval::{
    FusionStrategy, SearchWeights, DEFAULT_DENSE_WEIGHT, DEFAULT_SPARSE_WEIGHT, DEFAULT_TOP_K,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for [`crate::HybridRag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HragConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingYamlConfig,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub search: SearchYamlConfig,
}

impl HragConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: HragConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Offline configuration: stub embedder of `dimension`, in-memory collections.
    pub fn stub(dimension: usize) -> Self {
        Self {
            embedding: EmbeddingConfig::stub(dimension),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.embedding
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("embedding: {e}")))?;
        self.chunking.validate()?;
        self.index.validate()?;
        self.search.validate()?;
        Ok(())
    }

    /// Index configs for the global and tenant collections, in that order.
    pub fn collection_configs(&self) -> (IndexConfig, IndexConfig) {
        let dimension = self.embedding.dimension;
        let global = CollectionSchema::new(&self.index.global_collection, dimension);
        let tenant = CollectionSchema::new(&self.index.tenant_collection, dimension);
        (self.index.index_config(global), self.index.index_config(tenant))
    }
}

impl Default for HragConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingYamlConfig::default(),
            index: IndexYamlConfig::default(),
            search: SearchYamlConfig::default(),
        }
    }
}

/// Chunking applied to tenant-scoped ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingYamlConfig {
    #[serde(default = "default_tenant_max_length")]
    pub tenant_max_length: usize,

    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Overrides the built-in separator list when set.
    #[serde(default)]
    pub separators: Option<Vec<String>>,
}

impl ChunkingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.chunk_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("chunking: {e}")))?;
        if self.overlap >= self.tenant_max_length {
            return Err(ConfigLoadError::Validation(
                "chunking.overlap must be smaller than chunking.tenant_max_length".to_string(),
            ));
        }
        Ok(())
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        let cfg = ChunkConfig::new(self.tenant_max_length).with_overlap(self.overlap);
        match &self.separators {
            Some(separators) => cfg.with_separators(separators.iter().cloned()),
            None => cfg,
        }
    }
}

impl Default for ChunkingYamlConfig {
    fn default() -> Self {
        Self {
            tenant_max_length: TENANT_MAX_LENGTH,
            overlap: DEFAULT_CHUNK_OVERLAP,
            separators: None,
        }
    }
}

/// Index YAML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory holding one `<collection>.redb` file per collection.
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    #[serde(default = "default_global_collection")]
    pub global_collection: String,

    #[serde(default = "default_tenant_collection")]
    pub tenant_collection: String,

    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default = "default_max_tenant_length")]
    pub max_tenant_length: usize,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["in_memory", "redb"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "index.backend must be one of: {valid_backends:?}"
            )));
        }

        if self.backend == "redb" && self.path.is_none() {
            return Err(ConfigLoadError::Validation(
                "index.path is required when backend is 'redb'".to_string(),
            ));
        }

        let valid_codecs = ["zstd", "none"];
        if !valid_codecs.contains(&self.compression.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "index.compression must be one of: {valid_codecs:?}"
            )));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigLoadError::Validation(
                "index.compression_level must be between 1 and 22".to_string(),
            ));
        }

        if self.global_collection == self.tenant_collection {
            return Err(ConfigLoadError::Validation(
                "index.global_collection and index.tenant_collection must differ".to_string(),
            ));
        }
        if self.max_text_length == 0 || self.max_tenant_length == 0 {
            return Err(ConfigLoadError::Validation(
                "index length limits must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    fn index_config(&self, schema: CollectionSchema) -> IndexConfig {
        let backend = match (self.backend.as_str(), &self.path) {
            ("redb", Some(dir)) => {
                let file: PathBuf = Path::new(dir).join(format!("{}.redb", schema.name));
                BackendConfig::redb(file.to_string_lossy())
            }
            _ => BackendConfig::in_memory(),
        };
        let codec = match self.compression.as_str() {
            "none" => CompressionCodec::None,
            _ => CompressionCodec::Zstd,
        };
        IndexConfig::new()
            .with_backend(backend)
            .with_compression(CompressionConfig::new(codec, self.compression_level))
            .with_schema(
                schema
                    .with_max_text_length(self.max_text_length)
                    .with_max_tenant_length(self.max_tenant_length),
            )
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            compression: default_compression(),
            compression_level: default_compression_level(),
            global_collection: default_global_collection(),
            tenant_collection: default_tenant_collection(),
            max_text_length: MAX_TEXT_LENGTH,
            max_tenant_length: MAX_TENANT_LENGTH,
        }
    }
}

/// Search defaults applied when a request leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchYamlConfig {
    #[serde(default = "default_dense_weight")]
    pub dense_weight: f32,

    #[serde(default = "default_sparse_weight")]
    pub sparse_weight: f32,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default)]
    pub fusion: FusionStrategy,
}

impl SearchYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.weights()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("search: {e}")))?;
        if self.default_top_k == 0 {
            return Err(ConfigLoadError::Validation(
                "search.default_top_k must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn weights(&self) -> SearchWeights {
        SearchWeights::new(self.dense_weight, self.sparse_weight)
    }
}

impl Default for SearchYamlConfig {
    fn default() -> Self {
        Self {
            dense_weight: DEFAULT_DENSE_WEIGHT,
            sparse_weight: DEFAULT_SPARSE_WEIGHT,
            default_top_k: DEFAULT_TOP_K,
            fusion: FusionStrategy::default(),
        }
    }
}

// Helper functions for serde defaults
fn default_tenant_max_length() -> usize {
    TENANT_MAX_LENGTH
}
fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}
fn default_backend() -> String {
    "in_memory".to_string()
}
fn default_compression() -> String {
    "zstd".to_string()
}
fn default_compression_level() -> i32 {
    3
}
fn default_global_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}
fn default_tenant_collection() -> String {
    TENANT_COLLECTION.to_string()
}
fn default_max_text_length() -> usize {
    MAX_TEXT_LENGTH
}
fn default_max_tenant_length() -> usize {
    MAX_TENANT_LENGTH
}
fn default_dense_weight() -> f32 {
    DEFAULT_DENSE_WEIGHT
}
fn default_sparse_weight() -> f32 {
    DEFAULT_SPARSE_WEIGHT
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
embedding:
  mode: "stub"
  dimension: 64
search:
  sparse_weight: 0.5
  fusion: "store"
"#;

        let config = HragConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("test config"));
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.search.weights(), SearchWeights::new(1.0, 0.5));
        assert_eq!(config.search.fusion, FusionStrategy::Store);
        assert_eq!(config.chunking.tenant_max_length, 2000);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"version: \"1\"\n").unwrap();

        let config = HragConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.version, "1");
        assert_eq!(config.index.backend, "in_memory");
    }

    #[test]
    fn test_missing_file() {
        let err = HragConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileRead(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let err = HragConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_redb_requires_path() {
        let yaml = r#"
version: "1.0"
index:
  backend: "redb"
"#;
        let err = HragConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("index.path"));
    }

    #[test]
    fn test_invalid_sections_are_rejected() {
        for yaml in [
            "version: \"1\"\nembedding:\n  mode: \"onnx\"\n",
            "version: \"1\"\nchunking:\n  tenant_max_length: 0\n",
            "version: \"1\"\nchunking:\n  tenant_max_length: 50\n  overlap: 50\n",
            "version: \"1\"\nsearch:\n  dense_weight: -1.0\n",
            "version: \"1\"\nsearch:\n  default_top_k: 0\n",
            "version: \"1\"\nindex:\n  compression: \"lz4\"\n",
        ] {
            assert!(
                matches!(HragConfig::from_yaml(yaml), Err(ConfigLoadError::Validation(_))),
                "accepted {yaml:?}"
            );
        }
        assert!(matches!(
            HragConfig::from_yaml("version: [\n"),
            Err(ConfigLoadError::YamlParse(_))
        ));
    }

    #[test]
    fn test_collection_configs() {
        let yaml = r#"
version: "1.0"
embedding:
  dimension: 8
index:
  backend: "redb"
  path: "/data"
  compression: "none"
"#;
        let config = HragConfig::from_yaml(yaml).unwrap();
        let (global, tenant) = config.collection_configs();
        assert_eq!(global.schema.name, DEFAULT_COLLECTION);
        assert_eq!(global.schema.dimension, 8);
        assert_eq!(tenant.schema.name, TENANT_COLLECTION);
        assert_eq!(
            global.backend,
            BackendConfig::redb("/data/bge_m3_hybrid_search.redb")
        );
        assert_eq!(global.compression.codec, CompressionCodec::None);
    }
}
