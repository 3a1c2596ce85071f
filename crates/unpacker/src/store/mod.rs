//! Backend stores that extracted entries are materialized into.
//!
//! Keys are `/`-separated relative paths. Directories are implicit: a
//! directory exists while some file key lives underneath it.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by a [`BackendStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No file or directory exists at the key.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped onto the backend.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// An I/O error occurred while accessing the key.
    #[error("IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A key-addressed blob store.
///
/// Implementations must accept concurrent calls on independent keys; the
/// extractor issues saves and deletes from several worker threads at once.
pub trait BackendStore: Send + Sync {
    /// Returns whether a file or directory exists at `key`.
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Lists the immediate children of `key` as `(directories, files)`.
    ///
    /// Names are relative to `key`.
    fn list_directory(&self, key: &str) -> Result<(Vec<String>, Vec<String>), StoreError>;

    /// Deletes the file at `key`.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Writes `bytes` to `key`, replacing any previous content.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Reads the file at `key`.
    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}
