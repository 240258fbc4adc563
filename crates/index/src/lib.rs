//! # Hybrid vector collections
//!
//! Storage for documents that carry both a dense embedding and a sparse
//! term-weight map, searchable by inner product over either field.
//!
//! ## Core pieces
//!
//! - [`VectorIndex`]: one collection. Records are encoded with `bincode`,
//!   optionally compressed with Zstd, and written through a pluggable
//!   [`IndexBackend`] (in-memory or redb). Search structures (the dense
//!   vector list and a sparse inverted index) live in memory and are rebuilt
//!   from the backend when a persistent collection is reopened.
//! - [`AnnRequest`] / [`Hit`]: one nearest-neighbour request and its scored
//!   results, optionally restricted by a [`Filter`] such as
//!   `tenant_id == "acme"`.
//! - [`WeightedRanker`]: weighted linear fusion of several hit lists.
//! - [`VectorStore`]: the async surface the retrieval layer talks to,
//!   including a store-side `hybrid_search`.
//!
//! ## Example
//!
//! ```
//! use index::{AnnRequest, CollectionSchema, Filter, IndexConfig, NewRecord, VectorIndex};
//!
//! let cfg = IndexConfig::new().with_schema(CollectionSchema::tenant_scoped(3));
//! let index = VectorIndex::new(cfg).unwrap();
//!
//! index
//!     .insert(vec![NewRecord {
//!         text: "hello".into(),
//!         tenant_id: Some("acme".into()),
//!         sparse_vector: [(7, 0.4)].into_iter().collect(),
//!         dense_vector: vec![0.0, 1.0, 0.0],
//!     }])
//!     .unwrap();
//!
//! let request = AnnRequest::dense(vec![0.0, 1.0, 0.0], 5).with_filter(Some(Filter::tenant("acme")));
//! let hits = index.search(&request).unwrap();
//! assert_eq!(hits[0].text, "hello");
//! ```

mod backend;
mod filter;
mod fusion;
mod query;
mod schema;
mod store;

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{BackendConfig, InMemoryBackend, IndexBackend};
pub use filter::{Filter, FilterField};
pub use fusion::WeightedRanker;
pub use query::{AnnRequest, Hit, QueryVector, VectorField};
pub use schema::{
    CollectionSchema, Metric, DEFAULT_COLLECTION, DEFAULT_DIMENSION, MAX_TENANT_LENGTH,
    MAX_TEXT_LENGTH, TENANT_COLLECTION,
};
pub use store::VectorStore;

use bincode::config::standard;
use bincode::error::{DecodeError, EncodeError};
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zstd::{decode_all, encode_all};

/// Bump whenever the encoded [`StoredRecord`] layout changes.
pub const INDEX_SCHEMA_VERSION: u16 = 1;

/// Term id to weight, same shape the embedding layer produces.
pub type SparseVector = BTreeMap<u32, f32>;

/// A record as handed to [`VectorIndex::insert`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewRecord {
    pub text: String,
    pub tenant_id: Option<String>,
    pub sparse_vector: SparseVector,
    pub dense_vector: Vec<f32>,
}

/// A record as persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    /// Opaque handle assigned on insert.
    pub id: String,
    /// Insertion sequence within the collection. Breaks score ties.
    pub seq: u64,
    pub text: String,
    pub tenant_id: Option<String>,
    pub sparse_vector: SparseVector,
    pub dense_vector: Vec<f32>,
}

const fn default_schema_version() -> u16 {
    INDEX_SCHEMA_VERSION
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionCodec {
    None,
    #[default]
    Zstd,
}

/// Compression applied to encoded records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressionConfig {
    pub codec: CompressionCodec,
    /// Zstd level, 1 to 22.
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(encode_all(data, self.level)?),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(decode_all(data)?),
        }
    }
}

/// Everything needed to open a collection.
#[derive(Clone, Debug, Default)]
pub struct IndexConfig {
    pub backend: BackendConfig,
    pub compression: CompressionConfig,
    pub schema: CollectionSchema,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_schema(mut self, schema: CollectionSchema) -> Self {
        self.schema = schema;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
    #[error("Compression error: {0}")]
    Zstd(String),
    #[error("Schema violation: {0}")]
    Schema(String),
    #[error("Dense dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid filter: {0}")]
    Filter(String),
    #[error("Invalid query: {0}")]
    Query(String),
}

impl From<EncodeError> for IndexError {
    fn from(e: EncodeError) -> Self {
        IndexError::Encode(e.to_string())
    }
}

impl From<DecodeError> for IndexError {
    fn from(e: DecodeError) -> Self {
        IndexError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Zstd(e.to_string())
    }
}

impl IndexError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

/// In-memory search structures for one collection.
#[derive(Default)]
struct CollectionState {
    /// Ordered by `seq`; a record's position is its slot.
    records: Vec<StoredRecord>,
    /// term id -> (slot, weight)
    postings: hashbrown::HashMap<u32, Vec<(usize, f32)>>,
    next_seq: u64,
}

impl CollectionState {
    fn push(&mut self, record: StoredRecord) {
        let slot = self.records.len();
        for (&term, &weight) in &record.sparse_vector {
            self.postings.entry(term).or_default().push((slot, weight));
        }
        self.next_seq = self.next_seq.max(record.seq + 1);
        self.records.push(record);
    }
}

/// One dense + sparse collection.
pub struct VectorIndex {
    backend: Box<dyn IndexBackend>,
    cfg: IndexConfig,
    state: RwLock<CollectionState>,
}

impl VectorIndex {
    /// Open the collection described by `cfg`, building its backend.
    pub fn new(cfg: IndexConfig) -> Result<Self, IndexError> {
        let backend = cfg.backend.build()?;
        Self::with_backend(cfg, backend)
    }

    /// Open on an already constructed backend, loading whatever it holds.
    pub fn with_backend(cfg: IndexConfig, backend: Box<dyn IndexBackend>) -> Result<Self, IndexError> {
        let index = Self {
            backend,
            cfg,
            state: RwLock::new(CollectionState::default()),
        };
        index.reload()?;
        Ok(index)
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.cfg.schema
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, CollectionState>, IndexError> {
        self.state
            .read()
            .map_err(|_| IndexError::backend("poisoned collection lock"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, CollectionState>, IndexError> {
        self.state
            .write()
            .map_err(|_| IndexError::backend("poisoned collection lock"))
    }

    /// Rebuild search structures from the backend.
    fn reload(&self) -> Result<(), IndexError> {
        let mut loaded = Vec::new();
        self.backend.scan(&mut |data: &[u8]| {
            let record = self.decode_record(data)?;
            if record.schema_version != INDEX_SCHEMA_VERSION {
                return Err(IndexError::Schema(format!(
                    "record {} has schema version {}, expected {}",
                    record.id, record.schema_version, INDEX_SCHEMA_VERSION
                )));
            }
            self.cfg.schema.check_dense(&record.dense_vector)?;
            loaded.push(record);
            Ok(())
        })?;
        loaded.sort_by_key(|r| r.seq);

        let mut state = CollectionState::default();
        for record in loaded {
            state.push(record);
        }
        let count = state.records.len();
        *self.write_state()? = state;

        if count > 0 {
            tracing::info!(
                collection = %self.cfg.schema.name,
                records = count,
                "collection loaded"
            );
        }
        Ok(())
    }

    /// Validate and write a batch, returning the new record ids in order.
    ///
    /// The whole batch is checked against the schema before anything is
    /// written.
    pub fn insert(&self, records: Vec<NewRecord>) -> Result<Vec<String>, IndexError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        for record in &records {
            self.cfg.schema.check_record(record)?;
        }

        let mut state = self.write_state()?;
        let base = state.next_seq;
        let stored: Vec<StoredRecord> = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| StoredRecord {
                schema_version: INDEX_SCHEMA_VERSION,
                id: uuid::Uuid::new_v4().to_string(),
                seq: base + i as u64,
                text: r.text,
                tenant_id: r.tenant_id,
                sparse_vector: r.sparse_vector,
                dense_vector: r.dense_vector,
            })
            .collect();

        let entries = stored
            .iter()
            .map(|r| Ok((r.id.clone(), self.encode_record(r)?)))
            .collect::<Result<Vec<_>, IndexError>>()?;
        self.backend.batch_put(entries)?;

        let ids: Vec<String> = stored.iter().map(|r| r.id.clone()).collect();
        for record in stored {
            state.push(record);
        }

        tracing::debug!(
            collection = %self.cfg.schema.name,
            inserted = ids.len(),
            total = state.records.len(),
            "records inserted"
        );
        Ok(ids)
    }

    /// Fetch one record by id straight from the backend.
    pub fn get(&self, id: &str) -> Result<Option<StoredRecord>, IndexError> {
        match self.backend.get(id)? {
            Some(data) => Ok(Some(self.decode_record(&data)?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> Result<usize, IndexError> {
        Ok(self.read_state()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    pub fn flush(&self) -> Result<(), IndexError> {
        self.backend.flush()
    }

    fn encode_record(&self, record: &StoredRecord) -> Result<Vec<u8>, IndexError> {
        let encoded = encode_to_vec(record, standard())?;
        self.cfg.compression.compress(&encoded)
    }

    fn decode_record(&self, data: &[u8]) -> Result<StoredRecord, IndexError> {
        let decoded = self.cfg.compression.decompress(data)?;
        let (record, _) = decode_from_slice(&decoded, standard())?;
        Ok(record)
    }
}
