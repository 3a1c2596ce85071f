//! Extraction coordinator.
//!
//! [`Extractor`] drives a package through validation, cleanup of the
//! destination and the per-entry writes, for a local directory or for a
//! [`BackendStore`].

use crate::archive::{ArchiveReader, Package};
use crate::cleanup::delete_prefix;
use crate::config::ExtractConfig;
use crate::error::ExtractError;
use crate::pool::{TaskOutcome, WorkerPool};
use crate::safety::{join_key, validate_entry_path};
use crate::store::BackendStore;
use crate::types::{ExtractReport, ExtractionState, FailedEntry};
use parking_lot::Mutex;
use std::fs;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Callback receiving every store write outcome. The success value is the
/// number of bytes written.
pub type OutcomeObserver = dyn Fn(&TaskOutcome<u64>) + Send + Sync;

/// Materializes packages into local directories or backend stores.
#[derive(Clone)]
pub struct Extractor {
    config: ExtractConfig,
    observer: Option<Arc<OutcomeObserver>>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractConfig::default())
    }
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self {
            config: config.normalized(),
            observer: None,
        }
    }

    /// Registers a callback invoked once per store write, on the worker
    /// thread that ran it.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&TaskOutcome<u64>) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Replaces `destination` with the contents of `package`.
    ///
    /// The directory is destroyed and recreated first (the `Cleaning` state),
    /// so an invalid package leaves it empty. Entries are written one after
    /// another; directory records become directories and entries refused by
    /// [`validate_entry_path`] are skipped.
    ///
    /// On `Err` no report is returned; the move to `Aborted` is only visible
    /// in the debug log.
    pub fn extract_local<R>(
        &self,
        package: Package<R>,
        destination: &Path,
    ) -> Result<ExtractReport, ExtractError>
    where
        R: Read + Seek,
    {
        let start_time = Instant::now();
        let mut report = ExtractReport::new(package.name(), &destination.display().to_string());

        report.transition(ExtractionState::Cleaning);
        if let Err(e) = reset_directory(destination) {
            tracing::error!("could not reset {}: {}", destination.display(), e);
            report.transition(ExtractionState::Aborted);
            return Err(e);
        }

        report.transition(ExtractionState::Validating);
        let archive = match ArchiveReader::open(package) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::error!("{}", e);
                report.transition(ExtractionState::Aborted);
                return Err(e);
            }
        };

        tracing::info!("Extracting all the files now from {}", archive.name());
        report.entries_total = archive.len() as u64;
        report.transition(ExtractionState::WritingEntries);

        for raw in archive.list_entries() {
            if archive.is_dir_entry(raw) {
                let trimmed = raw.trim_end_matches(|c: char| c == '/' || c == '\\');
                match validate_entry_path(trimmed) {
                    Ok(relative) => {
                        if let Err(e) = fs::create_dir_all(destination.join(&relative)) {
                            tracing::error!("failed to create directory {}: {}", relative, e);
                            report.failed.push(FailedEntry {
                                path: raw.clone(),
                                error: e.to_string(),
                            });
                        } else {
                            report.directories_created += 1;
                        }
                    }
                    Err(reason) => skip_entry(&mut report, raw, &reason),
                }
                continue;
            }

            let relative = match validate_entry_path(raw) {
                Ok(relative) => relative,
                Err(reason) => {
                    skip_entry(&mut report, raw, &reason);
                    continue;
                }
            };

            match write_local_entry(&archive, raw, &destination.join(&relative)) {
                Ok(size) => {
                    report.files_written += 1;
                    report.bytes_written += size;
                }
                Err(e) => {
                    tracing::error!("failed to extract {}: {}", raw, e);
                    report.failed.push(FailedEntry {
                        path: raw.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.duration = start_time.elapsed();
        report.transition(ExtractionState::Completed);
        Ok(report)
    }

    /// Replaces everything under `prefix` in `store` with the contents of
    /// `package`.
    ///
    /// An invalid package aborts before any store call. Otherwise the prefix
    /// is cleared, then one write task per surviving entry is submitted to
    /// the worker pool, and the call returns once all of them finished.
    /// Individual write failures are logged and listed in the report; they
    /// do not fail the call. As with [`Extractor::extract_local`], an
    /// aborted run returns only the error.
    pub fn extract_to_store<R, S>(
        &self,
        package: Package<R>,
        store: &S,
        prefix: &str,
    ) -> Result<ExtractReport, ExtractError>
    where
        R: Read + Seek + Send,
        S: BackendStore + ?Sized,
    {
        let start_time = Instant::now();
        let mut report = ExtractReport::new(package.name(), prefix);

        report.transition(ExtractionState::Validating);
        let archive = match ArchiveReader::open(package) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::error!("{}", e);
                report.transition(ExtractionState::Aborted);
                return Err(e);
            }
        };
        report.entries_total = archive.len() as u64;

        report.transition(ExtractionState::Cleaning);
        report.cleanup = delete_prefix(store, prefix, self.config.max_workers);

        report.transition(ExtractionState::WritingEntries);
        let written = AtomicU64::new(0);
        let bytes_written = AtomicU64::new(0);
        let failed = Mutex::new(Vec::new());
        let observer = self.observer.as_deref();

        WorkerPool::scope(self.config.max_workers, |pool| {
            for raw in archive.list_entries() {
                let relative = match validate_entry_path(raw) {
                    Ok(relative) => relative,
                    Err(reason) => {
                        skip_entry(&mut report, raw, &reason);
                        continue;
                    }
                };

                let key = join_key(prefix, &relative);
                let archive = &archive;
                let (written, bytes_written, failed) = (&written, &bytes_written, &failed);

                pool.submit(
                    raw.clone(),
                    move || {
                        let bytes = archive.read_entry(raw)?;
                        store.save(&key, &bytes)?;
                        tracing::info!("saved {} ({} bytes)", key, bytes.len());
                        Ok(bytes.len() as u64)
                    },
                    move |outcome: &TaskOutcome<u64>| {
                        match outcome {
                            TaskOutcome::Succeeded { value, .. } => {
                                written.fetch_add(1, Ordering::Relaxed);
                                bytes_written.fetch_add(*value, Ordering::Relaxed);
                            }
                            TaskOutcome::Failed { id, error } => {
                                tracing::error!("failed to extract {}: {}", id, error);
                                failed.lock().push(FailedEntry {
                                    path: id.clone(),
                                    error: error.to_string(),
                                });
                            }
                        }
                        if let Some(observer) = observer {
                            observer(outcome);
                        }
                    },
                );
            }
        });

        report.files_written = written.into_inner();
        report.bytes_written = bytes_written.into_inner();
        report.failed = failed.into_inner();
        report.duration = start_time.elapsed();
        report.transition(ExtractionState::Completed);

        tracing::info!(
            "{} extracted to {}: {} written, {} skipped, {} failed",
            report.archive,
            prefix,
            report.files_written,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

fn skip_entry(report: &mut ExtractReport, raw: &str, reason: &dyn std::fmt::Display) {
    tracing::info!("skipping {}: {}", raw, reason);
    report.skipped.push(raw.to_string());
}

/// Removes `path` if present and recreates it empty.
fn reset_directory(path: &Path) -> Result<(), ExtractError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn write_local_entry<R: Read + Seek>(
    archive: &ArchiveReader<R>,
    raw: &str,
    output_path: &Path,
) -> Result<u64, ExtractError> {
    let bytes = archive.read_entry(raw)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, &bytes)?;
    Ok(bytes.len() as u64)
}
