//! Kached Cache Tier - bounded in-memory cache
//!
//! This crate implements the fast tier of kached:
//! - Cost accounting against a configurable ceiling
//! - Frequency-based admission (TinyLFU-style counting sketch)
//! - LRU victim selection driven by a logical clock
//! - Asynchronous eviction notifications with a drain (`wait`) operation

pub mod cache;
pub mod config;
pub mod error;
mod notify;
mod sketch;

// Re-exports
pub use cache::{CacheStats, CacheStatsSnapshot, CostCache, EvictionListener};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
