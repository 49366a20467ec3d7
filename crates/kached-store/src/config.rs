//! Durable tier configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the database inside a storage directory
pub const DB_FILE_NAME: &str = "kached.redb";

/// Durable tier configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the database file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("./kached-data")
    }
}

impl StoreConfig {
    /// Place the database file inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(DB_FILE_NAME),
        }
    }
}
