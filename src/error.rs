//! Error types for the cache pools
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for pools, the simple cache facade and registries.
///
/// Backend failures during normal operation never show up here: pools log
/// them and report `false`. Only malformed input and misconfiguration are
/// raised as errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A key failed structural validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Misconfiguration, such as an unknown registry name or an empty pool path
    #[error("Cache error: {0}")]
    Cache(String),

    /// A storage backend could not be opened or prepared
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CacheError {
    /// Returns true if this error signals malformed caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CacheError::InvalidArgument(_))
    }
}

// == Storage Error Enum ==
/// Errors raised by the storage collaborators.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested file or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A path escapes the storage root or an identifier is not usable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true if the error means the target was already absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// == Result Type Aliases ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Convenience Result type for storage collaborators.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
