//! Sync error types.

use thiserror::Error;

/// Errors from the walk/replicate pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("registry returned {status} for {url}")]
    RegistryStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] waypost_core::Error),

    #[error("storage error: {0}")]
    Storage(#[from] waypost_storage::StorageError),

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("unhandled media type: {0}")]
    UnhandledMediaType(String),

    #[error("walk task failed: {0}")]
    Task(String),
}
