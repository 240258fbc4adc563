//! Persistent collections on redb, a pure Rust embedded key-value store.
//!
//! Every collection gets its own database file. One write transaction per
//! batch means an insert is either fully visible after commit or not at all.
//!
//! ```yaml
//! index:
//!   backend: "redb"
//!   path: "/data/collections"
//! ```

use crate::{IndexBackend, IndexError};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("hybrid_records");

/// redb-backed [`IndexBackend`].
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open the database at `path`, creating the file and table on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let db = Database::create(path).map_err(IndexError::backend)?;

        let write_txn = db.begin_write().map_err(IndexError::backend)?;
        {
            let _table = write_txn.open_table(RECORDS).map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl IndexBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), IndexError> {
        self.batch_put(vec![(key.to_string(), value.to_vec())])
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::backend)?;
        let table = read_txn.open_table(RECORDS).map_err(IndexError::backend)?;
        let value = table.get(key).map_err(IndexError::backend)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn.open_table(RECORDS).map_err(IndexError::backend)?;
            for (key, value) in &entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(IndexError::backend)?;
            }
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn scan(
        &self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::backend)?;
        let table = read_txn.open_table(RECORDS).map_err(IndexError::backend)?;

        for item in table.iter().map_err(IndexError::backend)? {
            let (_, value) = item.map_err(IndexError::backend)?;
            visitor(value.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn redb_batch_then_get() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("records.redb")).unwrap();

        backend
            .batch_put(vec![
                ("id-1".to_string(), b"one".to_vec()),
                ("id-2".to_string(), b"two".to_vec()),
            ])
            .unwrap();
        backend.put("id-3", b"three").unwrap();

        assert_eq!(backend.get("id-2").unwrap(), Some(b"two".to_vec()));
        assert_eq!(backend.get("id-4").unwrap(), None);
    }

    #[test]
    fn redb_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put("id-1", b"persisted").unwrap();
        }

        let reopened = RedbBackend::open(&path).unwrap();
        let mut values = Vec::new();
        reopened
            .scan(&mut |value| {
                values.push(value.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(values, vec![b"persisted".to_vec()]);
    }
}
