//! Error types for the response cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the cache and metrics layers.
///
/// None of these escape the cache tiers: `PersistentCache` recovers from
/// every variant locally. They surface only from the storage port itself,
/// configuration loading and the CLI.
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store cannot be read or written (quota, permissions, absence)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Persisted record could not be parsed back into a cache entry
    #[error("Failed to decode cached record: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error means the durable tier should be treated as absent.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_) | Error::Io(_))
    }
}
