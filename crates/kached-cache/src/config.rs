//! Cache tier configuration

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};

/// Cache tier configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of frequency counters kept by the admission sketch
    pub num_counters: usize,
    /// Maximum total cost of resident entries
    pub max_cost: i64,
    /// Capacity of the eviction notification buffer; notifications that
    /// do not fit are dropped
    pub buffer_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            num_counters: 10_000,
            max_cost: 1000,
            buffer_items: 64,
        }
    }
}

impl CacheConfig {
    /// Check the configuration for values the cache cannot run with
    pub fn validate(&self) -> CacheResult<()> {
        if self.num_counters == 0 {
            return Err(CacheError::InvalidConfig(
                "num_counters must be greater than zero".into(),
            ));
        }
        if self.max_cost <= 0 {
            return Err(CacheError::InvalidConfig(format!(
                "max_cost must be positive, got {}",
                self.max_cost
            )));
        }
        if self.buffer_items == 0 {
            return Err(CacheError::InvalidConfig(
                "buffer_items must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
