//! # Unpacker
//!
//! Concurrent extraction of uploaded zip packages into a local directory or
//! a key-addressed blob store.
//!
//! Every entry path is checked before use to prevent path traversal, the
//! previous extraction at the destination is removed first, and store writes
//! are spread over a bounded pool of worker threads. Individual write
//! failures are logged and reported without aborting the rest of the
//! extraction.
//!
//! ## Example
//!
//! ```rust,no_run
//! use unpacker::{ExtractConfig, Extractor, LocalStore, Package};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = Extractor::new(ExtractConfig::from_env());
//! let store = LocalStore::new("/srv/media");
//!
//! let package = Package::open(Path::new("course.h5p"))?;
//! let report = extractor.extract_to_store(package, &store, "h5p/course-42")?;
//!
//! println!("Wrote {} files, {} failed", report.files_written, report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod extract;
pub mod pool;
pub mod safety;
pub mod store;
pub mod types;

// Re-export main types
pub use archive::{ArchiveReader, Package};
pub use cleanup::delete_prefix;
pub use config::ExtractConfig;
pub use error::ExtractError;
pub use extract::{Extractor, OutcomeObserver};
pub use pool::{TaskHandle, TaskOutcome, WorkerPool};
pub use safety::PathRejection;
pub use store::{BackendStore, LocalStore, MemoryStore, StoreError};
pub use types::{CleanupStats, ExtractReport, ExtractionState, FailedEntry};

use std::path::Path;

/// Extract the package file at `archive_path` into `output_dir`, replacing
/// whatever the directory held before.
///
/// # Errors
///
/// Returns an error if:
/// - The package file cannot be opened
/// - The output directory cannot be reset
/// - The package is not a valid zip
pub fn unpack_to_directory(
    archive_path: &Path,
    output_dir: &Path,
    config: &ExtractConfig,
) -> Result<ExtractReport, ExtractError> {
    let package = Package::open(archive_path)?;
    Extractor::new(config.clone()).extract_local(package, output_dir)
}

/// Extract the package file at `archive_path` into `store` under `prefix`,
/// replacing whatever the prefix held before.
///
/// # Errors
///
/// Returns an error if the package file cannot be opened or is not a valid
/// zip. Failed writes are listed in the returned report instead.
pub fn unpack_to_store<S>(
    archive_path: &Path,
    store: &S,
    prefix: &str,
    config: &ExtractConfig,
) -> Result<ExtractReport, ExtractError>
where
    S: BackendStore + ?Sized,
{
    let package = Package::open(archive_path)?;
    Extractor::new(config.clone()).extract_to_store(package, store, prefix)
}
