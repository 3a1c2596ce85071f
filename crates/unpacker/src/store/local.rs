//! Filesystem-backed store.

use super::{BackendStore, StoreError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A [`BackendStore`] rooted at a directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto a path below the root, refusing keys that would
    /// leave it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for component in Path::new(key.trim_matches('/')).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }
        Ok(path)
    }
}

fn io_error(key: &str, source: io::Error) -> StoreError {
    if source.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl BackendStore for LocalStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.resolve(key)?.exists())
    }

    fn list_directory(&self, key: &str) -> Result<(Vec<String>, Vec<String>), StoreError> {
        let path = self.resolve(key)?;
        if !path.is_dir() {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let mut directories = Vec::new();
        let mut files = Vec::new();
        let walker = WalkDir::new(&path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| StoreError::Io {
                key: key.to_string(),
                source: e.into(),
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_dir() {
                directories.push(name);
            } else {
                files.push(name);
            }
        }
        Ok((directories, files))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        fs::remove_file(&path).map_err(|e| io_error(key, e))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if path == self.root {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(key, e))?;
        }
        fs::write(&path, bytes).map_err(|e| io_error(key, e))
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        fs::read(&path).map_err(|e| io_error(key, e))
    }
}
