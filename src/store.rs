//! The key/value store collaborator.
//!
//! Configuration lives in a flat store addressed by path-like keys
//! (`prod/common/db.host`). The aggregation engine only needs two calls from
//! it, captured by [`KeyValueStore`]:
//!
//! - [`list`](KeyValueStore::list) every key under a prefix, in order. An
//!   unknown prefix lists as empty.
//! - [`read_bulk`](KeyValueStore::read_bulk) the raw string values of a set of
//!   keys.
//!
//! Two implementations ship with the crate. [`DirStore`] maps a local
//! directory tree onto the contract (one file per key, file contents are the
//! value), which is the layout a synced bucket has on disk. [`MemoryStore`] is
//! an in-memory map for tests and embedding.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Key not found: {0}")]
    MissingKey(String),

    #[error("Failed to walk store: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Anything that can list and bulk-read string values by key.
pub trait KeyValueStore {
    /// Every key starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Raw values for `keys`. Fails if any key is absent.
    fn read_bulk(&self, keys: &[String]) -> Result<BTreeMap<String, String>, StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(prefix)
    }

    fn read_bulk(&self, keys: &[String]) -> Result<BTreeMap<String, String>, StoreError> {
        (**self).read_bulk(keys)
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn read_bulk(&self, keys: &[String]) -> Result<BTreeMap<String, String>, StoreError> {
        keys.iter()
            .map(|key| match self.entries.get(key) {
                Some(value) => Ok((key.clone(), value.clone())),
                None => Err(StoreError::MissingKey(key.clone())),
            })
            .collect()
    }
}

/// Store backed by a directory: the key of a file is its path relative to
/// the root, joined with `/`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl KeyValueStore for DirStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Io {
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "store root is not a directory",
                ),
            });
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.key_for(entry.path())
                && key.starts_with(prefix)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn read_bulk(&self, keys: &[String]) -> Result<BTreeMap<String, String>, StoreError> {
        let mut values = BTreeMap::new();
        for key in keys {
            let path = self.root.join(key);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    values.insert(key.clone(), content);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StoreError::MissingKey(key.clone()));
                }
                Err(e) => return Err(StoreError::Io { path, source: e }),
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn memory() -> MemoryStore {
        [
            ("prod/common/db.host", "h1"),
            ("prod/common/db.port", "5432"),
            ("prod/commonality/x", "1"),
            ("prod/provisioning/region", "eu"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn memory_lists_by_prefix() {
        let keys = memory().list("prod/common/").unwrap();
        assert_eq!(keys, vec!["prod/common/db.host", "prod/common/db.port"]);
    }

    #[test]
    fn memory_unknown_prefix_is_empty() {
        assert!(memory().list("staging/").unwrap().is_empty());
    }

    #[test]
    fn memory_read_bulk() {
        let store = memory();
        let keys = store.list("prod/common/").unwrap();
        let values = store.read_bulk(&keys).unwrap();
        assert_eq!(values["prod/common/db.host"], "h1");
        assert_eq!(values["prod/common/db.port"], "5432");
    }

    #[test]
    fn memory_read_missing_key_fails() {
        let err = memory().read_bulk(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey(k) if k == "nope"));
    }

    fn seeded_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let common = dir.path().join("prod").join("common");
        fs::create_dir_all(&common).unwrap();
        fs::write(common.join("db.host"), "h1\n").unwrap();
        fs::write(common.join("replicas"), "3").unwrap();
        let deploy = dir.path().join("prod").join("deployment").join("api");
        fs::create_dir_all(&deploy).unwrap();
        fs::write(deploy.join("image.pull"), "Always").unwrap();
        dir
    }

    #[test]
    fn dir_lists_relative_slash_keys() {
        let dir = seeded_dir();
        let store = DirStore::new(dir.path());
        let keys = store.list("prod/common/").unwrap();
        assert_eq!(keys, vec!["prod/common/db.host", "prod/common/replicas"]);
    }

    #[test]
    fn dir_lists_everything_with_empty_prefix() {
        let dir = seeded_dir();
        let keys = DirStore::new(dir.path()).list("").unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn dir_unknown_prefix_is_empty() {
        let dir = seeded_dir();
        let keys = DirStore::new(dir.path()).list("staging/").unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn dir_reads_file_contents() {
        let dir = seeded_dir();
        let store = DirStore::new(dir.path());
        let keys = store.list("prod/deployment/api/").unwrap();
        let values = store.read_bulk(&keys).unwrap();
        assert_eq!(values["prod/deployment/api/image.pull"], "Always");
    }

    #[test]
    fn dir_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path().join("absent"));
        assert!(matches!(store.list("prod/"), Err(StoreError::Io { .. })));
    }

    #[test]
    fn dir_read_missing_key_fails() {
        let dir = seeded_dir();
        let err = DirStore::new(dir.path())
            .read_bulk(&["prod/common/nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingKey(_)));
    }
}
