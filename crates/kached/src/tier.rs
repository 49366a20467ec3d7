//! Seams between the coordinator and its two tiers
//!
//! The coordinator only talks to tiers through these traits, so either
//! side can be replaced (a different cache, a test double for the store)
//! without touching the coordination logic.

use kached_cache::{CacheError, CacheStatsSnapshot, CostCache};
use kached_store::{ReadHandle, RedbStore, StoreResult, WriteHandle};
use std::hash::Hash;
use std::sync::Arc;

/// Bounded in-memory tier.
///
/// `set` may refuse an entry and entries may disappear at any time; the
/// coordinator treats both as normal.
pub trait CacheTier<K, V>: Send + Sync {
    /// Offer an entry; `false` means it was not admitted
    fn set(&self, key: K, value: V, cost: i64) -> bool;

    fn get(&self, key: &K) -> Option<V>;

    fn delete(&self, key: &K);

    /// Block until asynchronous cache work queued so far has completed
    fn wait(&self) {}

    fn close(&self) -> Result<(), CacheError>;

    fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot::default()
    }
}

/// Transactional byte-oriented tier.
///
/// An `Err` returned by the closure aborts the transaction and is returned
/// to the caller unchanged.
pub trait DurableTier: Send + Sync {
    fn update<T>(&self, f: impl FnOnce(&mut dyn WriteHandle) -> StoreResult<T>)
    -> StoreResult<T>;

    fn view<T>(&self, f: impl FnOnce(&dyn ReadHandle) -> StoreResult<T>) -> StoreResult<T>;

    fn close(&self) -> StoreResult<()>;
}

impl<K, V> CacheTier<K, V> for CostCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: K, value: V, cost: i64) -> bool {
        Self::set(self, key, value, cost)
    }

    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key)
    }

    fn delete(&self, key: &K) {
        Self::delete(self, key);
    }

    fn wait(&self) {
        Self::wait(self);
    }

    fn close(&self) -> Result<(), CacheError> {
        Self::close(self)
    }

    fn stats(&self) -> CacheStatsSnapshot {
        Self::stats(self).snapshot()
    }
}

impl DurableTier for RedbStore {
    fn update<T>(
        &self,
        f: impl FnOnce(&mut dyn WriteHandle) -> StoreResult<T>,
    ) -> StoreResult<T> {
        Self::update(self, f)
    }

    fn view<T>(&self, f: impl FnOnce(&dyn ReadHandle) -> StoreResult<T>) -> StoreResult<T> {
        Self::view(self, f)
    }

    fn close(&self) -> StoreResult<()> {
        Self::close(self)
    }
}

impl<K, V, T> CacheTier<K, V> for Arc<T>
where
    T: CacheTier<K, V> + ?Sized,
{
    fn set(&self, key: K, value: V, cost: i64) -> bool {
        (**self).set(key, value, cost)
    }

    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn delete(&self, key: &K) {
        (**self).delete(key);
    }

    fn wait(&self) {
        (**self).wait();
    }

    fn close(&self) -> Result<(), CacheError> {
        (**self).close()
    }

    fn stats(&self) -> CacheStatsSnapshot {
        (**self).stats()
    }
}

impl<T: DurableTier> DurableTier for Arc<T> {
    fn update<R>(
        &self,
        f: impl FnOnce(&mut dyn WriteHandle) -> StoreResult<R>,
    ) -> StoreResult<R> {
        (**self).update(f)
    }

    fn view<R>(&self, f: impl FnOnce(&dyn ReadHandle) -> StoreResult<R>) -> StoreResult<R> {
        (**self).view(f)
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }
}
