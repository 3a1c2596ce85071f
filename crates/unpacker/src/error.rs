//! Error types for package extraction operations.

use crate::store::StoreError;
use thiserror::Error;

/// Main error type for extraction operations.
///
/// Only [`ExtractError::InvalidArchive`], [`ExtractError::Config`] and local
/// filesystem setup failures abort an extraction. The remaining variants
/// describe why a single read, write or delete task failed; those are logged
/// and collected into the report instead of being returned.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The package failed container integrity validation.
    #[error("{name} is not a valid zip: {reason}")]
    InvalidArchive {
        /// Name of the rejected package
        name: String,
        /// Reason reported by the zip reader
        reason: String,
    },

    /// An entry could not be located or decompressed.
    #[error("Failed to read entry {path}: {source}")]
    Entry {
        /// Entry path inside the archive
        path: String,
        /// Underlying zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// The backend store rejected an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error occurred during extraction.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A submitted task panicked while running on a worker.
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// The extraction configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
