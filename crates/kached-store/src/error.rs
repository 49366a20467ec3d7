//! Error types for the durable tier

/// Error type for durable store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,
    #[error("store is closed")]
    Closed,
    #[error("transaction aborted: {0}")]
    Aborted(String),
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl StoreError {
    /// Abort the surrounding transaction with a message
    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    /// Check if this is the missing-key condition
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
