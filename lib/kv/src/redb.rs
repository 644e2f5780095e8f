use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::KVError;
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

fn storage_err(e: impl std::fmt::Display) -> KVError {
    KVError::Storage(e.to_string())
}

/// RedbStore is a KVStore implementation backed by redb — a pure-Rust
/// embedded key-value database with a single-writer transaction model.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(storage_err)?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TABLE).map_err(storage_err)?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage_err)?;
            table.insert(key, value).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage_err)?;
            table.remove(key).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage_err)?;
            for key in keys {
                table.remove(*key).map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TABLE).map_err(storage_err)?;

        let mut results = Vec::new();
        let iter = table.range(prefix..).map_err(storage_err)?;

        for entry in iter {
            let entry = entry.map_err(storage_err)?;
            let key = entry.0.value().to_string();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key, entry.1.value().to_vec()));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (RedbStore, tempfile::NamedTempFile) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        (RedbStore::open(tmp.path()).unwrap(), tmp)
    }

    #[test]
    fn test_get_set_delete() {
        let (store, _tmp) = open_temp();

        assert!(store.get("users/u1/habits/run").unwrap().is_none());
        store.set("users/u1/habits/run", b"x").unwrap();
        assert_eq!(store.get("users/u1/habits/run").unwrap().unwrap(), b"x");

        store.delete("users/u1/habits/run").unwrap();
        assert!(store.get("users/u1/habits/run").unwrap().is_none());

        // Deleting an absent key is fine.
        store.delete("users/u1/habits/run").unwrap();
    }

    #[test]
    fn test_scan_is_prefix_bounded_and_ordered() {
        let (store, _tmp) = open_temp();

        store.set("users/u1/habits/run/2024-01-02T00:00:00Z", b"b").unwrap();
        store.set("users/u1/habits/run/2024-01-01T00:00:00Z", b"a").unwrap();
        store.set("users/u1/habits/running/2024-01-01T00:00:00Z", b"c").unwrap();
        store.set("users/u2/habits/run/2024-01-01T00:00:00Z", b"d").unwrap();

        let hits = store.scan("users/u1/habits/run/").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "users/u1/habits/run/2024-01-01T00:00:00Z");
        assert_eq!(hits[1].0, "users/u1/habits/run/2024-01-02T00:00:00Z");
    }

    #[test]
    fn test_batch_delete() {
        let (store, _tmp) = open_temp();

        store.set("a/1", b"1").unwrap();
        store.set("a/2", b"2").unwrap();
        store.set("b/1", b"3").unwrap();

        store.batch_delete(&["a/1", "a/2"]).unwrap();
        assert!(store.scan("a/").unwrap().is_empty());
        assert_eq!(store.scan("b/").unwrap().len(), 1);
    }

    #[test]
    fn test_set_replaces() {
        let (store, _tmp) = open_temp();

        store.set("k", b"v1").unwrap();
        store.set("k", b"v2").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"v2");
    }
}
