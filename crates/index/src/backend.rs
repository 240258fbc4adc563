use crate::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Key-value storage underneath a collection.
///
/// Keys are record ids, values are encoded [`crate::StoredRecord`]s. Search
/// structures live in memory and are rebuilt from [`IndexBackend::scan`].
pub trait IndexBackend: Send + Sync {
    /// Insert or replace one value.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), IndexError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IndexError>;
    /// Write a batch. Backends with transactions commit it as one unit.
    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), IndexError>;
    /// Visit every stored value.
    fn scan(
        &self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<(), IndexError>,
    ) -> Result<(), IndexError>;
    fn flush(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Backend selection.
///
/// ```
/// use index::BackendConfig;
///
/// let ephemeral = BackendConfig::in_memory();
/// let persistent = BackendConfig::redb("/data/collections/global.redb");
/// assert_ne!(ephemeral, persistent);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Single-file redb database at `path`.
    Redb { path: String },
    #[default]
    InMemory,
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, BackendConfig::Redb { .. })
    }

    pub fn build(&self) -> Result<Box<dyn IndexBackend>, IndexError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryBackend::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbBackend::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(IndexError::backend("redb backend disabled at compile time"))
                }
            }
        }
    }
}

/// Ephemeral backend: a `HashMap` behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexBackend for InMemoryBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), IndexError> {
        self.records
            .write()
            .map_err(|_| IndexError::backend("poisoned lock"))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let guard = self
            .records
            .read()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        Ok(guard.get(key).cloned())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), IndexError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        guard.extend(entries);
        Ok(())
    }

    fn scan(
        &self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        let guard = self
            .records
            .read()
            .map_err(|_| IndexError::backend("poisoned lock"))?;
        for value in guard.values() {
            visitor(value)?;
        }
        Ok(())
    }
}

#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use self::redb::RedbBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_put_get_scan() {
        let backend = InMemoryBackend::new();
        backend.put("a", b"1").unwrap();
        backend
            .batch_put(vec![("b".into(), b"2".to_vec()), ("c".into(), b"3".to_vec())])
            .unwrap();

        assert_eq!(backend.get("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get("missing").unwrap(), None);

        let mut seen = Vec::new();
        backend
            .scan(&mut |value| {
                seen.push(value.to_vec());
                Ok(())
            })
            .unwrap();
        seen.sort();
        assert_eq!(seen, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn scan_stops_at_first_visitor_error() {
        let backend = InMemoryBackend::new();
        backend.put("a", b"1").unwrap();
        backend.put("b", b"2").unwrap();

        let mut visits = 0;
        let result = backend.scan(&mut |_| {
            visits += 1;
            Err(IndexError::Decode("bad record".into()))
        });
        assert!(result.is_err());
        assert_eq!(visits, 1);
    }

    #[test]
    fn backend_config_parses_from_tagged_json() {
        let cfg: BackendConfig =
            serde_json::from_str(r#"{"kind":"redb","path":"/tmp/x.redb"}"#).unwrap();
        assert_eq!(cfg, BackendConfig::redb("/tmp/x.redb"));
        assert!(cfg.is_persistent());
        assert!(!BackendConfig::default().is_persistent());
    }
}
