//! In-process store.

use super::{BackendStore, StoreError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// A [`BackendStore`] holding blobs in memory, ordered by key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

fn normalize(key: &str) -> &str {
    key.trim_matches('/')
}

/// Returns the part of `key` below `dir`, or `None` when `key` is not under it.
fn strip_dir<'a>(key: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(key);
    }
    key.strip_prefix(dir)?.strip_prefix('/')
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `files`.
    pub fn with_files<K, V>(files: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(k, v)| (normalize(k.as_ref()).to_string(), v.into()))
            .collect();
        Self {
            files: RwLock::new(files),
        }
    }

    /// All file keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl BackendStore for MemoryStore {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let key = normalize(key);
        let files = self.files.read();
        Ok(files.contains_key(key) || files.keys().any(|k| strip_dir(k, key).is_some()))
    }

    fn list_directory(&self, key: &str) -> Result<(Vec<String>, Vec<String>), StoreError> {
        let key = normalize(key);
        let files = self.files.read();

        let mut directories = BTreeSet::new();
        let mut names = Vec::new();
        for rest in files.keys().filter_map(|k| strip_dir(k, key)) {
            match rest.split_once('/') {
                Some((dir, _)) => {
                    directories.insert(dir.to_string());
                }
                None => names.push(rest.to_string()),
            }
        }

        if directories.is_empty() && names.is_empty() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok((directories.into_iter().collect(), names))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = normalize(key);
        match self.files.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let key = normalize(key);
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        self.files.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let key = normalize(key);
        self.files
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryStore {
        MemoryStore::with_files([
            ("pkg/index.html", "index"),
            ("pkg/assets/x.png", "x"),
            ("pkg/assets/fonts/a.woff", "a"),
            ("pkgother/file.txt", "other"),
        ])
    }

    #[test]
    fn test_exists() {
        let store = sample();
        assert!(store.exists("pkg").unwrap());
        assert!(store.exists("pkg/").unwrap());
        assert!(store.exists("pkg/assets").unwrap());
        assert!(store.exists("pkg/index.html").unwrap());
        assert!(!store.exists("pkg/ass").unwrap());
        assert!(!store.exists("missing").unwrap());
    }

    #[test]
    fn test_list_directory_immediate_children() {
        let store = sample();

        let (dirs, files) = store.list_directory("pkg").unwrap();
        assert_eq!(dirs, vec!["assets".to_string()]);
        assert_eq!(files, vec!["index.html".to_string()]);

        let (dirs, files) = store.list_directory("").unwrap();
        assert_eq!(dirs, vec!["pkg".to_string(), "pkgother".to_string()]);
        assert!(files.is_empty());

        assert!(matches!(
            store.list_directory("nothing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_delete_read() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.save("/a/b.txt", b"bytes").unwrap();
        assert_eq!(store.read("a/b.txt").unwrap(), b"bytes");
        assert_eq!(store.keys(), vec!["a/b.txt".to_string()]);

        store.delete("a/b.txt").unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.read("a/b.txt"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.save("/", b""), Err(StoreError::InvalidKey(_))));
    }
}
