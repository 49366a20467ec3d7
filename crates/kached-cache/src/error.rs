//! Error types for the cache tier

use thiserror::Error;

/// Result type for cache tier lifecycle operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Error type for cache tier lifecycle operations.
///
/// Data-path operations never fail with an error: a refused `set` is
/// reported as `false` and a missing key as `None`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn notification worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("notification worker panicked")]
    WorkerPanicked,

    #[error("cache is closed")]
    Closed,
}
