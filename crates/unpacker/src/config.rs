//! Extraction configuration.
//!
//! The worker count is resolved once, at startup, and handed to
//! [`Extractor::new`](crate::Extractor::new) and the worker pool explicitly.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable overriding [`ExtractConfig::max_workers`].
pub const MAX_WORKERS_ENV: &str = "UNPACK_MAX_WORKERS";

/// Default number of concurrent worker slots.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Configuration shared by every extraction run by one [`Extractor`](crate::Extractor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Maximum number of tasks executing concurrently in a worker pool
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl ExtractConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Missing, unparseable or zero values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MAX_WORKERS_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return Self::default();
        };

        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Self { max_workers: n },
            _ => {
                tracing::warn!(
                    "ignoring {}={:?}, using {} workers",
                    MAX_WORKERS_ENV,
                    raw,
                    DEFAULT_MAX_WORKERS
                );
                Self::default()
            }
        }
    }

    /// Loads the configuration from a JSON file such as `{"max_workers": 16}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractError> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| ExtractError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config.normalized())
    }

    /// Returns a copy with `max_workers` clamped to at least one.
    pub fn normalized(self) -> Self {
        Self {
            max_workers: self.max_workers.max(1),
        }
    }
}
