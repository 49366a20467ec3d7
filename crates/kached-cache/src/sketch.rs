//! Frequency sketch for cache admission
//!
//! A small count-min sketch with 4-bit saturating counters. Every access
//! (hit, miss or write) increments the key's counters; once the sample
//! window fills, all counters are halved so old popularity decays.

use std::hash::{Hash, Hasher};
use xxhash_rust::xxh64::Xxh64;

/// Counter ceiling (4-bit counters, as in TinyLFU)
const MAX_COUNT: u8 = 15;

/// Sample window as a multiple of the counter count
const WINDOW_FACTOR: usize = 10;

/// Hash a key into the 64-bit fingerprint used by the sketch
pub(crate) fn fingerprint<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = Xxh64::new(0);
    key.hash(&mut hasher);
    hasher.finish()
}

pub(crate) struct FrequencySketch {
    counters: Vec<u8>,
    samples: usize,
    window: usize,
}

impl FrequencySketch {
    pub(crate) fn new(num_counters: usize) -> Self {
        let width = num_counters.max(1);
        Self {
            counters: vec![0; width],
            samples: 0,
            window: width.saturating_mul(WINDOW_FACTOR),
        }
    }

    /// The two counter slots a fingerprint maps to
    fn slots(&self, hash: u64) -> [usize; 2] {
        let width = self.counters.len() as u64;
        let low = hash & 0xFFFF_FFFF;
        let high = hash >> 32;
        [(low % width) as usize, (high % width) as usize]
    }

    /// Record one access
    pub(crate) fn increment(&mut self, hash: u64) {
        let [a, b] = self.slots(hash);
        self.bump(a);
        if b != a {
            self.bump(b);
        }
        self.samples += 1;
        if self.samples >= self.window {
            self.reset();
        }
    }

    fn bump(&mut self, slot: usize) {
        let counter = &mut self.counters[slot];
        if *counter < MAX_COUNT {
            *counter += 1;
        }
    }

    /// Estimated access count for a fingerprint
    pub(crate) fn estimate(&self, hash: u64) -> u8 {
        let [a, b] = self.slots(hash);
        self.counters[a].min(self.counters[b])
    }

    /// Halve every counter
    fn reset(&mut self) {
        for counter in &mut self.counters {
            *counter >>= 1;
        }
        self.samples /= 2;
    }
}
