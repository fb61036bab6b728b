//! Error types for stores and the namespaced façade.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Failure raised by a [`Store`](crate::core::storage::Store) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The medium refused the operation (quota, disabled, read-only, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Filesystem access failed
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted contents could not be encoded or decoded
    #[error("store contents are not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors surfaced by the façade and the backend selector.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A named storage type that is not one of the recognized kinds.
    #[error("unsupported storage type: {0:?}")]
    UnsupportedConfiguration(String),

    /// Malformed call shape
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A value could not be turned into JSON, or stored text is not JSON.
    #[error("value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed after it was selected.
    #[error("backend operation failed: {0}")]
    Backend(#[from] BackendError),

    /// A watcher callback returned an error; remaining work was abandoned.
    #[error("watcher failed: {0:#}")]
    Watcher(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
