//! Transaction handles
//!
//! A handle is only valid inside the closure passed to
//! [`RedbStore::update`](crate::RedbStore::update) or
//! [`RedbStore::view`](crate::RedbStore::view). Returning an error from
//! that closure aborts the transaction.

use crate::error::{StoreError, StoreResult};
use redb::{ReadOnlyTable, ReadableTable, Table};

/// Read access inside a transaction
pub trait ReadHandle {
    /// Fetch the value stored under `key`, or [`StoreError::KeyNotFound`]
    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;
}

/// Read-write access inside a write transaction
pub trait WriteHandle: ReadHandle {
    /// Insert or replace `key`
    fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&mut self, key: &[u8]) -> StoreResult<()>;
}

/// Handle over the entries table of an open write transaction
pub struct WriteTxn<'txn> {
    table: Table<'txn, &'static [u8], &'static [u8]>,
}

impl<'txn> WriteTxn<'txn> {
    pub(crate) fn new(table: Table<'txn, &'static [u8], &'static [u8]>) -> Self {
        Self { table }
    }
}

impl ReadHandle for WriteTxn<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        match self.table.get(key)? {
            Some(val) => Ok(val.value().to_vec()),
            None => Err(StoreError::KeyNotFound),
        }
    }
}

impl WriteHandle for WriteTxn<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.table.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.table.remove(key)?;
        Ok(())
    }
}

/// Handle over the entries table of an open read transaction
pub struct ReadTxn {
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
}

impl ReadTxn {
    pub(crate) fn new(table: ReadOnlyTable<&'static [u8], &'static [u8]>) -> Self {
        Self { table }
    }
}

impl ReadHandle for ReadTxn {
    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        match self.table.get(key)? {
            Some(val) => Ok(val.value().to_vec()),
            None => Err(StoreError::KeyNotFound),
        }
    }
}
