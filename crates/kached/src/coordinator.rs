//! The coordinator
//!
//! [`Kached`] owns one cache tier, one durable tier and a codec, and maps
//! every tier outcome onto a [`ResultCode`]:
//!
//! | operation    | cache             | durable                 |
//! |--------------|-------------------|-------------------------|
//! | `set`        | write (1st)       | write (2nd)             |
//! | `get`        | read, repopulate  | read on cache miss      |
//! | `delete`     | delete (1st)      | delete (2nd)            |
//! | `cache_*`    | only tier touched |                         |
//! | `db_*`       |                   | only tier touched       |
//!
//! Writes are not atomic across tiers. When the durable write fails after
//! the cache accepted the entry, the cache keeps it.

use crate::codec::{BincodeCodec, Codec};
use crate::config::Config;
use crate::error::{Error, Failure, Result, ResultCode};
use crate::tier::{CacheTier, DurableTier};
use kached_cache::{CacheStatsSnapshot, CostCache, EvictionListener};
use kached_store::{RedbStore, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache-fronted durable key-value store
pub struct Kached<K, V, C = CostCache<K, V>, D = RedbStore, E = BincodeCodec> {
    cache: C,
    store: D,
    codec: E,
    default_cost: i64,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> Kached<K, V>
where
    K: Eq + Hash + Clone + Serialize + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open both tiers with the default cost cache, redb and bincode
    pub fn open(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like [`Kached::open`], reporting every cache eviction to `listener`.
    ///
    /// The listener runs on the cache's notification thread; use
    /// [`Kached::wait`] to make sure earlier evictions have been delivered.
    pub fn open_with_listener(
        config: Config,
        listener: impl Fn(&K, &V, i64) + Send + Sync + 'static,
    ) -> Result<Self> {
        let listener: EvictionListener<K, V> = Arc::new(listener);
        Self::build(config, Some(listener))
    }

    fn build(config: Config, listener: Option<EvictionListener<K, V>>) -> Result<Self> {
        config.validate()?;
        let cache = CostCache::build(config.cache, listener)?;
        let store = RedbStore::open(&config.store)?;

        info!(
            "Opened kached at {:?} (default_cost={})",
            store.path(),
            config.default_cost
        );
        Ok(Self::from_parts(cache, store, BincodeCodec, config.default_cost))
    }
}

impl<K, V, C, D, E> Kached<K, V, C, D, E>
where
    K: Clone + Serialize,
    V: Clone + Serialize + DeserializeOwned,
    C: CacheTier<K, V>,
    D: DurableTier,
    E: Codec,
{
    /// Assemble a coordinator from already opened tiers and a codec
    pub const fn from_parts(cache: C, store: D, codec: E, default_cost: i64) -> Self {
        Self {
            cache,
            store,
            codec,
            default_cost,
            _marker: PhantomData,
        }
    }

    pub const fn cache(&self) -> &C {
        &self.cache
    }

    pub const fn store(&self) -> &D {
        &self.store
    }

    pub const fn codec(&self) -> &E {
        &self.codec
    }

    /// Cost applied by [`Kached::set`] and by read-through repopulation
    pub const fn default_cost(&self) -> i64 {
        self.default_cost
    }

    /// Write through both tiers with the default cost
    pub fn set(&self, key: K, value: V) -> Result<()> {
        self.set_with_cost(key, value, self.default_cost)
    }

    /// Write through both tiers, cache first.
    ///
    /// Key and value are encoded before either tier is touched, so an
    /// encoding error leaves both tiers unchanged. After that the cache
    /// write and the durable write are both attempted:
    ///
    /// - cache refused, durable ok: [`ResultCode::CacheWriteFailed`]
    /// - cache ok, durable failed: [`ResultCode::DurableWriteFailed`]
    /// - both failed: [`ResultCode::BothWritesFailed`]
    ///
    /// A cache write is never undone when the durable write fails. When
    /// the cache refuses the entry, any older cached value for the key is
    /// removed so later reads fall through to the durable tier.
    pub fn set_with_cost(&self, key: K, value: V, cost: i64) -> Result<()> {
        let raw_key = self.codec.encode(&key)?;
        let raw_value = self.codec.encode(&value)?;

        let cached = self.cache.set(key.clone(), value, cost);
        if !cached {
            debug!("set: cache did not admit entry (cost={})", cost);
            self.cache.delete(&key);
        }

        match self.store.update(|txn| txn.put(&raw_key, &raw_value)) {
            Ok(()) if cached => Ok(()),
            Ok(()) => Err(ResultCode::CacheWriteFailed.into()),
            Err(e) => {
                let code = if cached {
                    ResultCode::DurableWriteFailed
                } else {
                    ResultCode::BothWritesFailed
                };
                warn!("set: durable write failed ({}): {}", code, e);
                Err(Failure::with_detail(code, e.to_string()).into())
            }
        }
    }

    /// Read through the cache.
    ///
    /// A cache miss falls back to the durable tier; a value found there is
    /// offered back to the cache at the default cost, and whether the cache
    /// takes it does not affect the result. A key missing from both tiers
    /// is [`ResultCode::NotFoundInEither`].
    pub fn get(&self, key: &K) -> Result<V> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }

        match self.db_get(key) {
            Ok(value) => {
                if !self.cache.set(key.clone(), value.clone(), self.default_cost) {
                    debug!("get: repopulated entry not admitted by cache");
                }
                Ok(value)
            }
            Err(e) if e.matches(ResultCode::NotFoundInDurable) => {
                Err(ResultCode::NotFoundInEither.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a key from both tiers.
    ///
    /// Only the durable outcome is reported; removing an absent key
    /// succeeds.
    pub fn delete(&self, key: &K) -> Result<()> {
        let raw_key = self.codec.encode(key)?;
        self.cache.delete(key);

        self.store
            .update(|txn| txn.delete(&raw_key))
            .map_err(|e| {
                warn!("delete: durable delete failed: {}", e);
                Error::from(Failure::with_detail(
                    ResultCode::DurableWriteFailed,
                    e.to_string(),
                ))
            })
    }

    /// Write to the cache only
    pub fn cache_set(&self, key: K, value: V, cost: i64) -> Result<()> {
        if self.cache.set(key, value, cost) {
            Ok(())
        } else {
            Err(ResultCode::CacheWriteFailed.into())
        }
    }

    /// Read from the cache only
    pub fn cache_get(&self, key: &K) -> Result<V> {
        self.cache
            .get(key)
            .ok_or_else(|| Error::from(ResultCode::NotFoundInCache))
    }

    /// Write to the durable tier only. The cache is not touched, so a stale
    /// cached value for `key` stays visible to [`Kached::get`].
    pub fn db_set(&self, key: K, value: V) -> Result<()> {
        let raw_key = self.codec.encode(&key)?;
        let raw_value = self.codec.encode(&value)?;

        self.store
            .update(|txn| txn.put(&raw_key, &raw_value))
            .map_err(|e| {
                warn!("db_set: durable write failed: {}", e);
                Error::from(Failure::with_detail(
                    ResultCode::DurableWriteFailed,
                    e.to_string(),
                ))
            })
    }

    /// Read from the durable tier only
    pub fn db_get(&self, key: &K) -> Result<V> {
        let raw_key = self.codec.encode(key)?;

        let raw_value = match self.store.view(|txn| txn.get(&raw_key)) {
            Ok(raw) => raw,
            Err(StoreError::KeyNotFound) => return Err(ResultCode::NotFoundInDurable.into()),
            Err(e) => {
                debug!("db_get: durable read failed: {}", e);
                return Err(e.into());
            }
        };

        Ok(self.codec.decode(&raw_value)?)
    }

    /// Block until pending cache work (eviction notifications) has drained
    pub fn wait(&self) {
        self.cache.wait();
    }

    /// Current cache statistics
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Release both tiers.
    ///
    /// Both releases are always attempted. A cache release error is logged;
    /// a durable release error is returned.
    pub fn close(&self) -> Result<()> {
        if let Err(e) = self.cache.close() {
            warn!("Failed to close cache tier: {}", e);
        }
        self.store.close()?;
        info!("Closed kached");
        Ok(())
    }
}
