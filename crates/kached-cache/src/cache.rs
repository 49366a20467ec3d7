//! Cost-accounted cache
//!
//! Entries carry a caller-supplied cost and the cache keeps the sum of
//! resident costs under `max_cost`. Admission of a new key is decided by
//! comparing its estimated access frequency with that of the entries it
//! would displace; victims are chosen least-recently-used first.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::notify::Notifier;
pub use crate::notify::EvictionListener;
use crate::sketch::{FrequencySketch, fingerprint};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tracing::{debug, info};

/// Resident entry with LRU tracking
struct CacheEntry<V> {
    value: V,
    cost: i64,
    /// Last access time for LRU eviction
    last_access: AtomicU64,
    /// Admission fingerprint, kept to avoid rehashing victims
    hash: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, cost: i64, hash: u64, clock: u64) -> Self {
        Self {
            value,
            cost,
            last_access: AtomicU64::new(clock),
            hash,
        }
    }

    fn touch(&self, clock: u64) {
        self.last_access.store(clock, Ordering::Relaxed);
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: AtomicU64,
    /// Number of cache misses
    pub misses: AtomicU64,
    /// Number of writes accepted
    pub admissions: AtomicU64,
    /// Number of writes refused by the admission policy
    pub rejections: AtomicU64,
    /// Number of entries evicted
    pub evictions: AtomicU64,
    /// Eviction notifications dropped because the listener fell behind
    pub dropped_notifications: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.admissions.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.dropped_notifications.store(0, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admissions: self.admissions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            dropped_notifications: self.dropped_notifications.load(Ordering::Relaxed),
            hit_ratio: self.hit_ratio(),
        }
    }
}

/// Copy of [`CacheStats`] at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub admissions: u64,
    pub rejections: u64,
    pub evictions: u64,
    pub dropped_notifications: u64,
    pub hit_ratio: f64,
}

/// Bounded, cost-accounted cache with frequency-based admission
pub struct CostCache<K, V> {
    /// Resident entries protected by RwLock
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// Sum of resident costs, only mutated under the entries write lock
    used_cost: AtomicI64,
    /// Access frequency estimates for admission
    sketch: Mutex<FrequencySketch>,
    /// Logical clock for LRU ordering
    clock: AtomicU64,
    /// Cache statistics
    stats: CacheStats,
    config: CacheConfig,
    notifier: Notifier<K, V>,
    closed: AtomicBool,
}

impl<K, V> CostCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache without an eviction listener
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::build(config, None)
    }

    /// Create a cache that reports evicted entries to `listener`.
    ///
    /// Delivery is asynchronous and best effort: when more than
    /// `buffer_items` notifications are pending the rest are dropped and
    /// counted in [`CacheStats::dropped_notifications`].
    pub fn with_listener(
        config: CacheConfig,
        listener: impl Fn(&K, &V, i64) + Send + Sync + 'static,
    ) -> CacheResult<Self> {
        let listener: EvictionListener<K, V> = Arc::new(listener);
        Self::build(config, Some(listener))
    }

    /// Create a cache with an optional, already shared listener
    pub fn build(
        config: CacheConfig,
        listener: Option<EvictionListener<K, V>>,
    ) -> CacheResult<Self> {
        config.validate()?;
        let notifier = Notifier::start(config.buffer_items, listener)?;

        info!(
            "Created cache: max_cost={}, num_counters={}",
            config.max_cost, config.num_counters
        );
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            used_cost: AtomicI64::new(0),
            sketch: Mutex::new(FrequencySketch::new(config.num_counters)),
            clock: AtomicU64::new(0),
            stats: CacheStats::default(),
            config,
            notifier,
            closed: AtomicBool::new(false),
        })
    }

    /// Get the configuration the cache was built with
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get cache statistics
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get the current number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sum of the costs of resident entries
    pub fn used_cost(&self) -> i64 {
        self.used_cost.load(Ordering::Relaxed)
    }

    /// Check whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Advance the logical clock and return the new value
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Check if a key is resident, without counting an access
    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Look up a key
    pub fn get(&self, key: &K) -> Option<V> {
        if self.is_closed() {
            return None;
        }
        self.sketch.lock().increment(fingerprint(key));

        let entries = self.entries.read();
        if let Some(entry) = entries.get(key) {
            entry.touch(self.tick());
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            Some(entry.value.clone())
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Insert or update a key with the given cost.
    ///
    /// Returns `false` when the entry was not admitted: the cost is outside
    /// `0..=max_cost`, the cache is closed, or the key is less popular than
    /// the entries it would displace. Updates of resident keys within the
    /// cost range are always accepted; an out-of-range update removes the
    /// resident entry so the old value is no longer served.
    pub fn set(&self, key: K, value: V, cost: i64) -> bool {
        if self.is_closed() {
            return false;
        }
        if cost < 0 || cost > self.config.max_cost {
            self.stats.rejections.fetch_add(1, Ordering::Relaxed);
            debug!("set rejected: cost {} outside 0..={}", cost, self.config.max_cost);
            self.delete(&key);
            return false;
        }

        let hash = fingerprint(&key);
        let candidate_freq = {
            let mut sketch = self.sketch.lock();
            sketch.increment(hash);
            sketch.estimate(hash)
        };
        let clock = self.tick();

        let evicted = {
            let mut entries = self.entries.write();

            if let Some(entry) = entries.get_mut(&key) {
                let delta = cost - entry.cost;
                entry.value = value;
                entry.cost = cost;
                entry.touch(clock);
                self.used_cost.fetch_add(delta, Ordering::Relaxed);
                let victims = self.select_victims(&entries, Some(&key), self.overflow(0));
                self.remove_victims(&mut entries, victims)
            } else {
                let victims = self.select_victims(&entries, None, self.overflow(cost));
                if !self.admit(candidate_freq, &entries, &victims) {
                    self.stats.rejections.fetch_add(1, Ordering::Relaxed);
                    debug!("set rejected: admission policy (freq={})", candidate_freq);
                    return false;
                }
                let evicted = self.remove_victims(&mut entries, victims);
                entries.insert(key, CacheEntry::new(value, cost, hash, clock));
                self.used_cost.fetch_add(cost, Ordering::Relaxed);
                evicted
            }
        };

        self.stats.admissions.fetch_add(1, Ordering::Relaxed);
        let dropped = self.notifier.evicted(evicted);
        if dropped > 0 {
            self.stats
                .dropped_notifications
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        true
    }

    /// Remove a key. Removal is not reported to the eviction listener.
    pub fn delete(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write();
        entries.remove(key).map(|entry| {
            self.used_cost.fetch_sub(entry.cost, Ordering::Relaxed);
            entry.value
        })
    }

    /// Block until pending eviction notifications have been delivered.
    /// Returns immediately when called from inside the listener.
    pub fn wait(&self) {
        self.notifier.flush();
    }

    /// Remove all entries without notifying the listener
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.used_cost.store(0, Ordering::Relaxed);
    }

    /// Stop the notification worker and drop all entries.
    ///
    /// Notifications queued before the call are still delivered. Closing
    /// twice returns [`CacheError::Closed`].
    pub fn close(&self) -> CacheResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Closed);
        }
        let result = self.notifier.shutdown();
        self.clear();
        info!("Closed cache");
        result
    }

    /// Cost that must be freed before `incoming` more fits
    fn overflow(&self, incoming: i64) -> i64 {
        self.used_cost.load(Ordering::Relaxed) + incoming - self.config.max_cost
    }

    /// Pick least-recently-used entries until `needed` cost is freed
    fn select_victims(
        &self,
        entries: &HashMap<K, CacheEntry<V>>,
        exclude: Option<&K>,
        needed: i64,
    ) -> Vec<K> {
        if needed <= 0 {
            return Vec::new();
        }

        let mut candidates: Vec<(&K, &CacheEntry<V>)> = entries
            .iter()
            .filter(|(key, _)| exclude != Some(*key))
            .collect();
        candidates.sort_unstable_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed));

        let mut freed = 0;
        let mut victims = Vec::new();
        for (key, entry) in candidates {
            if freed >= needed {
                break;
            }
            freed += entry.cost;
            victims.push(key.clone());
        }
        victims
    }

    /// Admit the candidate only if it is at least as popular as every victim
    fn admit(
        &self,
        candidate_freq: u8,
        entries: &HashMap<K, CacheEntry<V>>,
        victims: &[K],
    ) -> bool {
        let sketch = self.sketch.lock();
        victims
            .iter()
            .filter_map(|key| entries.get(key))
            .all(|entry| candidate_freq >= sketch.estimate(entry.hash))
    }

    /// Remove the selected victims, returning them for notification
    fn remove_victims(
        &self,
        entries: &mut HashMap<K, CacheEntry<V>>,
        victims: Vec<K>,
    ) -> Vec<(K, V, i64)> {
        let mut evicted = Vec::with_capacity(victims.len());
        for key in victims {
            if let Some((key, entry)) = entries.remove_entry(&key) {
                self.used_cost.fetch_sub(entry.cost, Ordering::Relaxed);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                evicted.push((key, entry.value, entry.cost));
            }
        }
        if !evicted.is_empty() {
            debug!("evicted {} entries, used_cost={}", evicted.len(), self.used_cost());
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::sync::{OnceLock, Weak};
    use std::time::{Duration, Instant};

    fn small_config(max_cost: i64) -> CacheConfig {
        CacheConfig {
            num_counters: 10_000,
            max_cost,
            buffer_items: 64,
        }
    }

    #[test]
    fn test_cache_set_and_get() {
        let cache = CostCache::new(small_config(100)).unwrap();

        assert!(cache.set("foo".to_string(), "bar".to_string(), 1));

        let retrieved = cache.get(&"foo".to_string());
        assert_eq!(retrieved.as_deref(), Some("bar"));
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.used_cost(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache: CostCache<u64, u64> = CostCache::new(small_config(100)).unwrap();

        assert!(cache.get(&42).is_none());
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cost_above_ceiling_is_rejected() {
        let cache = CostCache::new(small_config(10)).unwrap();

        assert!(!cache.set(1u64, 1u64, 11));
        assert!(!cache.set(2u64, 2u64, -1));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rejections.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_oversized_update_drops_resident_entry() {
        let cache = CostCache::new(small_config(10)).unwrap();
        cache.set(1u64, 10u64, 4);
        cache.set(2u64, 20u64, 4);

        assert!(!cache.set(1u64, 11u64, 11));
        assert!(!cache.contains(&1));
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.used_cost(), 4);
        assert_eq!(cache.get(&2), Some(20));
    }

    #[test]
    fn test_cost_accounting_and_eviction() {
        let cache = CostCache::new(small_config(2)).unwrap();

        // Insert 3 unit-cost entries into a cache with a ceiling of 2
        assert!(cache.set(1u64, 1u64, 1));
        assert!(cache.set(2u64, 2u64, 1));
        assert!(cache.set(3u64, 3u64, 1));

        // Should have evicted the oldest entry
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.used_cost(), 2);
        assert!(!cache.contains(&1));
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cache_lru_ordering() {
        let cache = CostCache::new(small_config(2)).unwrap();

        cache.set(1u64, 1u64, 1);
        cache.set(2u64, 2u64, 1);

        // Access entry 1 to make it more recent
        cache.get(&1);

        // Insert entry 3, should evict entry 2 (LRU)
        assert!(cache.set(3u64, 3u64, 1));

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn test_popular_entry_resists_one_hit_wonder() {
        let cache = CostCache::new(small_config(1)).unwrap();

        cache.set(1u64, 1u64, 1);
        for _ in 0..5 {
            cache.get(&1);
        }

        // A key seen once is less popular than the resident one
        assert!(!cache.set(2u64, 2u64, 1));
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_update_changes_cost() {
        let cache = CostCache::new(small_config(10)).unwrap();

        cache.set(1u64, 1u64, 3);
        cache.set(2u64, 2u64, 3);
        assert_eq!(cache.used_cost(), 6);

        // Growing key 2 pushes key 1 out; updates are always accepted
        assert!(cache.set(2u64, 20u64, 9));
        assert_eq!(cache.get(&2), Some(20));
        assert!(!cache.contains(&1));
        assert_eq!(cache.used_cost(), 9);
    }

    #[test]
    fn test_delete() {
        let cache = CostCache::new(small_config(10)).unwrap();

        cache.set(1u64, 10u64, 4);
        assert_eq!(cache.delete(&1), Some(10));
        assert!(cache.delete(&1).is_none());
        assert_eq!(cache.used_cost(), 0);
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_eviction_listener_after_wait() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let listener = move |key: &u64, value: &u64, cost: i64| {
            sink.lock().push((*key, *value, cost));
        };
        let cache = CostCache::with_listener(small_config(1), listener).unwrap();

        for i in 0..11u64 {
            cache.set(i, i * 10, 1);
        }
        cache.wait();

        let evicted = evicted.lock();
        assert_eq!(evicted.len(), 10);
        assert_eq!(evicted[0], (0, 0, 1));
        assert!(cache.contains(&10));
    }

    #[test]
    fn test_slow_listener_does_not_block_set() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let delivered = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&delivered);
        let listener = move |_: &u64, _: &u64, _: i64| {
            let _ = gate_rx.recv_timeout(Duration::from_secs(2));
            seen.fetch_add(1, Ordering::SeqCst);
        };
        let config = CacheConfig {
            buffer_items: 1,
            ..small_config(1)
        };
        let cache = CostCache::with_listener(config, listener).unwrap();

        let start = Instant::now();
        for i in 0..6u64 {
            assert!(cache.set(i, i, 1));
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        drop(gate_tx);
        cache.wait();
        let snapshot = cache.stats().snapshot();
        assert_eq!(snapshot.evictions, 5);
        assert!(snapshot.dropped_notifications >= 3);
        assert_eq!(
            delivered.load(Ordering::SeqCst) + snapshot.dropped_notifications,
            snapshot.evictions
        );
    }

    #[test]
    fn test_wait_inside_listener_returns() {
        let slot: Arc<OnceLock<Weak<CostCache<u64, u64>>>> = Arc::new(OnceLock::new());
        let calls = Arc::new(AtomicU64::new(0));
        let (inner_slot, inner_calls) = (Arc::clone(&slot), Arc::clone(&calls));
        let listener = move |_: &u64, _: &u64, _: i64| {
            if let Some(cache) = inner_slot.get().and_then(Weak::upgrade) {
                cache.wait();
            }
            inner_calls.fetch_add(1, Ordering::SeqCst);
        };
        let cache = Arc::new(CostCache::with_listener(small_config(1), listener).unwrap());
        slot.set(Arc::downgrade(&cache)).unwrap();

        for i in 0..3u64 {
            cache.set(i, i, 1);
        }
        cache.wait();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_close() {
        let cache = CostCache::new(small_config(10)).unwrap();
        cache.set(1u64, 1u64, 1);

        cache.close().unwrap();

        assert!(cache.is_closed());
        assert!(cache.is_empty());
        assert!(!cache.set(2u64, 2u64, 1));
        assert!(cache.get(&1).is_none());
        assert!(matches!(cache.close(), Err(CacheError::Closed)));

        // Draining a closed cache returns immediately
        cache.wait();
    }

    #[test]
    fn test_hit_ratio() {
        let cache = CostCache::new(small_config(10)).unwrap();
        cache.set(42u64, 1u64, 1);

        // 2 hits
        cache.get(&42);
        cache.get(&42);

        // 2 misses
        cache.get(&99);
        cache.get(&100);

        let snapshot = cache.stats().snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 2);
        assert!((snapshot.hit_ratio - 0.5).abs() < 0.01);

        cache.stats().reset();
        assert_eq!(cache.stats().snapshot(), CacheStatsSnapshot::default());
    }

    #[test]
    fn test_cost_never_exceeds_ceiling_under_random_load() {
        let cache = Arc::new(CostCache::new(small_config(50)).unwrap());
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2000 {
            let key = rng.gen_range(0..200u64);
            match rng.gen_range(0..3) {
                0 => {
                    cache.set(key, key, rng.gen_range(1..=8));
                }
                1 => {
                    cache.get(&key);
                }
                _ => {
                    cache.delete(&key);
                }
            }
            assert!(cache.used_cost() <= 50);
        }
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(CostCache::new(small_config(64)).unwrap());

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        let key = t * 1000 + i;
                        cache.set(key, i, 1);
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.used_cost() <= 64);
        assert_eq!(cache.len() as i64, cache.used_cost());
    }
}
