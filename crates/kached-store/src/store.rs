//! Durable key-value store backed by redb.
//!
//! All access goes through scoped transactions: `update` runs a closure
//! inside one write transaction and commits if it returns `Ok`, `view`
//! runs a closure inside one read transaction. Keys and values are opaque
//! bytes; encoding is the caller's concern.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::tables;
use crate::txn::{ReadHandle, ReadTxn, WriteHandle, WriteTxn};
use parking_lot::RwLock;
use redb::{Database, ReadableTableMetadata};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persistent key-value store backed by redb.
pub struct RedbStore {
    db: RwLock<Option<Database>>,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the redb database described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let path = config.path.as_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::ENTRIES)?;
        }
        write_txn.commit()?;

        info!("Opened durable store at {:?}", path);
        Ok(Self {
            db: RwLock::new(Some(db)),
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.db.read().is_none()
    }

    /// Run `f` inside one write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and is aborted
    /// otherwise; the closure's error is returned unchanged.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut dyn WriteHandle) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let write_txn = db.begin_write()?;
        let result = {
            let table = write_txn.open_table(tables::ENTRIES)?;
            let mut handle = WriteTxn::new(table);
            f(&mut handle)
        };

        match result {
            Ok(value) => {
                write_txn.commit()?;
                debug!("update committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = write_txn.abort() {
                    warn!("Failed to abort write transaction: {}", abort_err);
                }
                debug!("update aborted: {}", e);
                Err(e)
            }
        }
    }

    /// Run `f` inside one read transaction.
    pub fn view<T>(&self, f: impl FnOnce(&dyn ReadHandle) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(tables::ENTRIES)?;
        let handle = ReadTxn::new(table);
        f(&handle)
    }

    /// Number of stored entries
    pub fn len(&self) -> StoreResult<u64> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(tables::ENTRIES)?;
        Ok(table.len()?)
    }

    /// Check if the store holds no entries
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Release the database. Later operations fail with
    /// [`StoreError::Closed`], as does closing twice.
    pub fn close(&self) -> StoreResult<()> {
        match self.db.write().take() {
            Some(db) => {
                drop(db);
                info!("Closed durable store at {:?}", self.path);
                Ok(())
            }
            None => Err(StoreError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> RedbStore {
        RedbStore::open(&StoreConfig::new(dir)).unwrap()
    }

    #[test]
    fn test_put_get() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store.update(|txn| txn.put(b"key", b"test value")).unwrap();

        let value = store.view(|txn| txn.get(b"key")).unwrap();
        assert_eq!(value, b"test value");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_missing_key() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let err = store.view(|txn| txn.get(b"missing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store.update(|txn| txn.put(b"key", b"value")).unwrap();
        store.update(|txn| txn.delete(b"key")).unwrap();

        let err = store.view(|txn| txn.get(b"key")).unwrap_err();
        assert!(matches!(err, StoreError::KeyNotFound));

        // Deleting again is not an error
        store.update(|txn| txn.delete(b"key")).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_aborted_update_is_not_applied() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let err = store
            .update(|txn| {
                txn.put(b"key", b"value")?;
                Err::<(), _>(StoreError::aborted("changed my mind"))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Aborted(_)));

        assert!(store.view(|txn| txn.get(b"key")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_reads_own_writes() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let value = store
            .update(|txn| {
                txn.put(b"a", b"1")?;
                txn.get(b"a")
            })
            .unwrap();
        assert_eq!(value, b"1");
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();

        {
            let store = open_store(dir.path());
            for i in 0..10u8 {
                store.update(|txn| txn.put(&[i], &[i, i])).unwrap();
            }
            store.close().unwrap();
        }

        let store = open_store(dir.path());
        assert_eq!(store.len().unwrap(), 10);
        assert_eq!(store.view(|txn| txn.get(&[7])).unwrap(), vec![7, 7]);
    }

    #[test]
    fn test_use_after_close() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(
            store.update(|txn| txn.put(b"k", b"v")),
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            store.view(|txn| txn.get(b"k")),
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.close(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = open_store(&nested);
        assert!(store.path().exists());
        assert!(store.path().starts_with(&nested));
    }
}
