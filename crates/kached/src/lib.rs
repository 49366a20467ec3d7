//! Kached - a cache-fronted durable key-value store
//!
//! `Kached` presents one key-value API over two independently owned tiers:
//! a bounded in-memory cache ([`kached_cache::CostCache`]) and a durable,
//! transactional store ([`kached_store::RedbStore`]).
//!
//! - Writes go through both tiers, cache first.
//! - Reads consult the cache and fall back to, then repopulate from, the
//!   durable store.
//! - Bypass operations (`cache_*`, `db_*`) touch exactly one tier.
//!
//! The tiers are not updated atomically. A durable failure after a
//! successful cache write leaves the cache holding a value the store does
//! not have; this is reported through [`ResultCode`] and never rolled back.

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod tier;
pub mod value;

// Re-exports
pub use codec::{BincodeCodec, Codec, CodecError, JsonCodec};
pub use config::{Config, ConfigError};
pub use coordinator::Kached;
pub use error::{Error, Failure, Result, ResultCode, matches_code};
pub use tier::{CacheTier, DurableTier};
pub use value::Value;

pub use kached_cache::{CacheConfig, CacheStatsSnapshot, CostCache, EvictionListener};
pub use kached_store::{RedbStore, StoreConfig, StoreError};
