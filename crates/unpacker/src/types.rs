//! Type definitions for package extraction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Progress of one extraction.
///
/// `Pending → Validating → Aborted`, or
/// `Pending → Validating → Cleaning → WritingEntries → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionState {
    Pending,
    Validating,
    Aborted,
    Cleaning,
    WritingEntries,
    Completed,
}

/// An entry whose write task failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    /// Entry path inside the archive
    pub path: String,

    /// Rendered failure cause
    pub error: String,
}

/// Counters gathered while clearing a destination prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    /// Files removed
    pub deleted: u64,

    /// Delete, listing or existence checks that failed
    pub failed: u64,
}

impl CleanupStats {
    pub(crate) fn merge(&mut self, other: CleanupStats) {
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// Summary of a finished extraction.
///
/// A report means every task outcome was observed, not that every entry
/// was written. Check [`ExtractReport::failed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractReport {
    /// Name of the extracted package
    pub archive: String,

    /// Destination directory or store prefix
    pub destination: String,

    /// Final state of the extraction
    pub state: ExtractionState,

    /// Number of entries in the archive index
    pub entries_total: u64,

    /// Number of files written
    pub files_written: u64,

    /// Number of directories created (local extraction only)
    pub directories_created: u64,

    /// Entries skipped by path sanitization
    pub skipped: Vec<String>,

    /// Entries whose write failed
    pub failed: Vec<FailedEntry>,

    /// Cleanup counters for the destination prefix
    pub cleanup: CleanupStats,

    /// Total bytes written
    pub bytes_written: u64,

    /// Duration of the extraction (in seconds)
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl ExtractReport {
    pub(crate) fn new(archive: &str, destination: &str) -> Self {
        Self {
            archive: archive.to_string(),
            destination: destination.to_string(),
            state: ExtractionState::Pending,
            entries_total: 0,
            files_written: 0,
            directories_created: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
            cleanup: CleanupStats::default(),
            bytes_written: 0,
            duration: Duration::from_secs(0),
        }
    }

    /// Whether every surviving entry was written.
    pub fn is_clean(&self) -> bool {
        self.state == ExtractionState::Completed && self.failed.is_empty()
    }

    pub(crate) fn transition(&mut self, next: ExtractionState) {
        tracing::debug!("{}: {:?} -> {:?}", self.archive, self.state, next);
        self.state = next;
    }
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_duration_as_seconds() {
        let mut report = ExtractReport::new("pkg.h5p", "h5p/1");
        report.duration = Duration::from_millis(2500);
        report.transition(ExtractionState::Completed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 2);
        assert_eq!(json["state"], "completed");
        assert_eq!(json["archive"], "pkg.h5p");
    }

    #[test]
    fn test_is_clean() {
        let mut report = ExtractReport::new("pkg.h5p", "out");
        assert!(!report.is_clean());

        report.transition(ExtractionState::Completed);
        assert!(report.is_clean());

        report.failed.push(FailedEntry {
            path: "a.txt".into(),
            error: "boom".into(),
        });
        assert!(!report.is_clean());
    }
}
