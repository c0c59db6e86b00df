//! Error types for the user query cache.

use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cache, its store and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Value could not be encoded for the store.
    SerializationError(String),

    /// Stored payload could not be decoded.
    DeserializationError(String),

    /// Stored bytes do not carry a valid envelope.
    InvalidCacheEntry(String),

    /// Stored envelope was written by a different schema version.
    VersionMismatch { expected: u32, found: u32 },

    /// Cache store unavailable or rejected the operation.
    BackendError(String),

    /// Query executor failed.
    ExecutorError(String),

    /// User/site registry or posts cache lookup failed.
    RegistryError(String),

    /// Caller supplied inconsistent input.
    ValidationError(String),

    /// Invalid configuration.
    ConfigError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "cache schema version mismatch: expected {}, found {}",
                expected, found
            ),
            Error::BackendError(msg) => write!(f, "cache backend error: {}", msg),
            Error::ExecutorError(msg) => write!(f, "query executor error: {}", msg),
            Error::RegistryError(msg) => write!(f, "registry error: {}", msg),
            Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
            Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_display() {
        let err = Error::VersionMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "cache schema version mismatch: expected 2, found 1"
        );
    }

    #[test]
    fn test_json_error_maps_to_config_error() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
