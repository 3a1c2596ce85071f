//! Recursive removal of a previous extraction from a store.

use crate::pool::{TaskOutcome, WorkerPool};
use crate::safety::join_key;
use crate::store::BackendStore;
use crate::types::CleanupStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// Deletes every file under `prefix`, best effort.
///
/// Files of one directory are deleted concurrently; subdirectories are
/// visited one after another once the directory's own deletes have drained.
/// Nothing is escalated: failures are logged and counted. A missing prefix
/// is a no-op.
pub fn delete_prefix<S>(store: &S, prefix: &str, max_workers: usize) -> CleanupStats
where
    S: BackendStore + ?Sized,
{
    let mut stats = CleanupStats::default();

    match store.exists(prefix) {
        Ok(true) => {}
        Ok(false) => return stats,
        Err(e) => {
            tracing::error!("could not check {} before cleanup: {}", prefix, e);
            stats.failed += 1;
            return stats;
        }
    }

    tracing::info!("{} path is being deleted", prefix);
    let (directories, files) = match store.list_directory(prefix) {
        Ok(listing) => listing,
        Err(e) => {
            tracing::error!("could not list {}: {}", prefix, e);
            stats.failed += 1;
            return stats;
        }
    };

    let deleted = AtomicU64::new(0);
    let failed = AtomicU64::new(0);
    WorkerPool::scope(max_workers, |pool| {
        for file in &files {
            let key = join_key(prefix, file);
            let (deleted, failed) = (&deleted, &failed);
            pool.submit(
                key.clone(),
                move || Ok(store.delete(&key)?),
                move |outcome: &TaskOutcome<()>| match outcome {
                    TaskOutcome::Succeeded { id, .. } => {
                        deleted.fetch_add(1, Ordering::Relaxed);
                        tracing::info!("deleted {}", id);
                    }
                    TaskOutcome::Failed { id, error } => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!("failed to delete {}: {}", id, error);
                    }
                },
            );
        }
    });
    stats.deleted += deleted.into_inner();
    stats.failed += failed.into_inner();

    for directory in &directories {
        stats.merge(delete_prefix(store, &join_key(prefix, directory), max_workers));
    }

    stats
}
