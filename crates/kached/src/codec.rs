//! Value codecs for the durable tier
//!
//! The cache keeps keys and values in their native form; the durable tier
//! only stores bytes. A [`Codec`] converts between the two. Every payload
//! is wrapped in a single-field envelope before serialization, so all
//! stored records share one shape regardless of the caller's type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec failure. Fatal for the operation that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("failed to encode: {0}")]
    Encode(String),
    #[error("failed to decode: {0}")]
    Decode(String),
}

/// Converts typed keys and values to and from durable bytes.
///
/// Implementations must round-trip: `decode(&encode(v)?)? == v`.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, raw: &[u8]) -> Result<T, CodecError>;
}

#[derive(Serialize)]
struct Boxed<'a, T: ?Sized> {
    value: &'a T,
}

#[derive(Deserialize)]
struct Unboxed<T> {
    value: T,
}

/// Compact binary codec (bincode). The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(&Boxed { value }).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, raw: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize::<Unboxed<T>>(raw)
            .map(|boxed| boxed.value)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Human-readable JSON codec, useful when the stored bytes are inspected
/// by other tools.
///
/// JSON has no NaN or infinity: non-finite floats are written as `null`
/// and reading them back as a float fails with [`CodecError::Decode`]. Use
/// [`BincodeCodec`] for values that may hold them.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&Boxed { value }).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, raw: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice::<Unboxed<T>>(raw)
            .map(|boxed| boxed.value)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}
