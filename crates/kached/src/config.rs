//! Coordinator configuration
//!
//! ```toml
//! default_cost = 1
//!
//! [cache]
//! num_counters = 10000
//! max_cost = 1000
//! buffer_items = 64
//!
//! [store]
//! path = "/var/lib/kached/kached.redb"
//! ```

use kached_cache::CacheConfig;
use kached_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for both tiers plus the coordinator itself
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub store: StoreConfig,
    /// Cost used by `set` and by read-through repopulation
    pub default_cost: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            default_cost: 1,
        }
    }
}

impl Config {
    /// Default settings with the database placed inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            store: StoreConfig::new(dir),
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration for values the coordinator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.default_cost < 0 || self.default_cost > self.cache.max_cost {
            return Err(ConfigError::Invalid(format!(
                "default_cost must be within 0..={}, got {}",
                self.cache.max_cost, self.default_cost
            )));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store path is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_uses_defaults() {
        let config = Config::new("/tmp/kached-test");
        assert_eq!(config.default_cost, 1);
        assert_eq!(config.cache.num_counters, 10_000);
        assert_eq!(config.cache.max_cost, 1000);
        assert_eq!(config.cache.buffer_items, 64);
        assert!(config.store.path.starts_with("/tmp/kached-test"));
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml_str(
            r#"
            default_cost = 2

            [cache]
            num_counters = 10
            max_cost = 5

            [store]
            path = "/data/kv.redb"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_cost, 2);
        assert_eq!(config.cache.num_counters, 10);
        assert_eq!(config.cache.max_cost, 5);
        assert_eq!(config.cache.buffer_items, 64);
        assert_eq!(config.store.path, PathBuf::from("/data/kv.redb"));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.default_cost, 1);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = Config::from_toml_str("default_cost = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml_str("[cache]\nmax_cost = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml_str("default_cost = \"one\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kached.toml");
        std::fs::write(&path, "default_cost = 3\n").unwrap();

        assert_eq!(Config::load(&path).unwrap().default_cost, 3);

        let err = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
