//! Kached Durable Tier - transactional key-value persistence
//!
//! This crate owns the on-disk side of kached. Keys and values are opaque
//! byte strings stored in a single redb table; every access happens inside
//! a scoped read or write transaction.

pub mod config;
pub mod error;
pub mod store;
mod tables;
pub mod txn;

// Re-exports
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::RedbStore;
pub use txn::{ReadHandle, ReadTxn, WriteHandle, WriteTxn};
