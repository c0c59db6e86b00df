//! Versioned envelope for values written to the cache store.
//!
//! Every cached value is stored as:
//!
//! ```text
//! [MAGIC: 4 bytes] [VERSION: u32 little-endian] [POSTCARD PAYLOAD]
//! ```
//!
//! Entries written by an older schema fail the version check and are
//! treated as misses by the callers, so a schema bump never serves
//! misshapen data.

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Magic header identifying envelopes written by this crate.
pub const CACHE_MAGIC: [u8; 4] = *b"UQCE";

/// Bump whenever a cached type changes shape.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Encode `value` into a versioned envelope.
pub fn serialize_for_cache<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload =
        postcard::to_allocvec(value).map_err(|e| Error::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&CACHE_MAGIC);
    bytes.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a versioned envelope, validating magic and schema version.
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::InvalidCacheEntry(format!(
            "envelope too short: {} bytes",
            bytes.len()
        )));
    }

    if bytes[0..4] != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry("bad magic header".to_string()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..HEADER_LEN]);
    let found = u32::from_le_bytes(version);
    if found != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found,
        });
    }

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_header() {
        let bytes = serialize_for_cache(&42u64).unwrap();
        assert_eq!(&bytes[0..4], b"UQCE");
        assert_eq!(&bytes[4..8], &CURRENT_SCHEMA_VERSION.to_le_bytes());
        let value: u64 = deserialize_from_cache(&bytes).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = serialize_for_cache(&"salt").unwrap();
        bytes[0] = b'X';
        let err = deserialize_from_cache::<String>(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidCacheEntry(_)));
    }

    #[test]
    fn test_rejects_other_version() {
        let mut bytes = serialize_for_cache(&7u32).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let err = deserialize_from_cache::<u32>(&bytes).unwrap_err();
        assert_eq!(
            err,
            Error::VersionMismatch {
                expected: CURRENT_SCHEMA_VERSION,
                found: 99
            }
        );
    }

    #[test]
    fn test_rejects_truncated_envelope() {
        let err = deserialize_from_cache::<u32>(b"UQ").unwrap_err();
        assert!(matches!(err, Error::InvalidCacheEntry(_)));
    }
}
