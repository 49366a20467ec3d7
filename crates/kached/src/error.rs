//! Error taxonomy for kached
//!
//! Every coordinator outcome is classified by one [`ResultCode`]. A
//! [`Failure`] pairs a code with an optional detail string taken from the
//! tier that failed. Classification must go through [`matches_code`] (or
//! [`Error::matches`]): two failures with the same code but different
//! details are the same kind of error.

use crate::codec::CodecError;
use crate::config::ConfigError;
use kached_cache::CacheError;
use kached_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Common result type for kached operations
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of operation outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResultCode {
    NoError = 0,
    /// The cache tier did not admit the entry
    CacheWriteFailed = 1,
    /// The durable write transaction failed
    DurableWriteFailed = 2,
    /// Neither tier took the write
    BothWritesFailed = 3,
    NotFoundInCache = 4,
    NotFoundInDurable = 5,
    NotFoundInEither = 6,
}

impl ResultCode {
    /// Every code, in discriminant order
    pub const ALL: [Self; 7] = [
        Self::NoError,
        Self::CacheWriteFailed,
        Self::DurableWriteFailed,
        Self::BothWritesFailed,
        Self::NotFoundInCache,
        Self::NotFoundInDurable,
        Self::NotFoundInEither,
    ];

    /// Fixed, human-readable message for the code
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoError => "no error",
            Self::CacheWriteFailed => "unable to cache kv pair",
            Self::DurableWriteFailed => "unable to save kv pair",
            Self::BothWritesFailed => "unable to cache or save kv pair",
            Self::NotFoundInCache => "kv pair not found in cache",
            Self::NotFoundInDurable => "kv pair not found in database",
            Self::NotFoundInEither => "kv pair not found in cache or database",
        }
    }

    /// Check if this code reports a missing key
    #[must_use]
    pub const fn is_not_found(self) -> bool {
        matches!(
            self,
            Self::NotFoundInCache | Self::NotFoundInDurable | Self::NotFoundInEither
        )
    }

    /// Check if this code reports a failed write
    #[must_use]
    pub const fn is_write_failure(self) -> bool {
        matches!(
            self,
            Self::CacheWriteFailed | Self::DurableWriteFailed | Self::BothWritesFailed
        )
    }

    /// Check whether `text` is this code's message, bare or followed by a detail
    fn prefixes(self, text: &str) -> bool {
        text.strip_prefix(self.message())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(": "))
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ResultCode {}

/// A result code plus the failing tier's diagnostic, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    code: ResultCode,
    detail: Option<String>,
}

impl Failure {
    /// Create a failure without detail
    #[must_use]
    pub fn new(code: ResultCode) -> Self {
        debug_assert!(code != ResultCode::NoError, "NoError is not a failure");
        Self { code, detail: None }
    }

    /// Create a failure carrying the tier's message
    #[must_use]
    pub fn with_detail(code: ResultCode, detail: impl Into<String>) -> Self {
        debug_assert!(code != ResultCode::NoError, "NoError is not a failure");
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ResultCode {
        self.code
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Replace the detail message
    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }
}

impl From<ResultCode> for Failure {
    fn from(code: ResultCode) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.code.message(), detail),
            None => f.write_str(self.code.message()),
        }
    }
}

impl std::error::Error for Failure {}

/// Error type for kached operations
#[derive(Debug, Error)]
pub enum Error {
    /// A coordinator outcome classified by the taxonomy
    #[error(transparent)]
    Failure(#[from] Failure),

    /// A key or value could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// Durable tier error outside the taxonomy (open, close, failed reads)
    #[error("durable tier error: {0}")]
    Store(#[from] StoreError),

    /// Cache tier lifecycle error
    #[error("cache tier error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ResultCode> for Error {
    fn from(code: ResultCode) -> Self {
        Self::Failure(Failure::new(code))
    }
}

impl Error {
    /// The taxonomy code, if this error carries one
    #[must_use]
    pub const fn code(&self) -> Option<ResultCode> {
        match self {
            Self::Failure(failure) => Some(failure.code),
            _ => None,
        }
    }

    /// The detail string of a classified failure
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Failure(failure) => failure.detail(),
            _ => None,
        }
    }

    /// Method form of [`matches_code`]
    #[must_use]
    pub fn matches(&self, code: ResultCode) -> bool {
        matches_code(Some(self), code)
    }
}

/// Classify an error against a result code.
///
/// - `None` matches only [`ResultCode::NoError`]; a present error never does.
/// - A [`Failure`], an [`Error::Failure`] or a bare [`ResultCode`] matches
///   when its code is `code`; the detail is ignored.
/// - Any other error matches when its text is the code's message, alone or
///   followed by `": "` and a detail.
///
/// The text rule is stricter than a plain prefix test. Messages that merely
/// start with another code's message do not match it: "kv pair not found in
/// cache or database" does not match [`ResultCode::NotFoundInCache`], and
/// neither does "kv pair not found in cachex".
#[must_use]
pub fn matches_code(err: Option<&(dyn std::error::Error + 'static)>, code: ResultCode) -> bool {
    let Some(err) = err else {
        return code == ResultCode::NoError;
    };
    if code == ResultCode::NoError {
        return false;
    }

    if let Some(e) = err.downcast_ref::<Error>() {
        if let Some(found) = e.code() {
            return found == code;
        }
    } else if let Some(failure) = err.downcast_ref::<Failure>() {
        return failure.code == code;
    } else if let Some(found) = err.downcast_ref::<ResultCode>() {
        return *found == code;
    }

    code.prefixes(&err.to_string())
}
