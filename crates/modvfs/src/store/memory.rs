//! In-memory backing store.
//!
//! Holds the whole asset namespace as a flat map. Directory markers are keys
//! with a trailing `/` and an empty payload, the same shape a zip bundle uses,
//! so [`MemoryStore::load`] can ingest a bundle entry-for-entry.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{VfsError, VfsResult};
use crate::package::capacity_hint;
use crate::path;
use crate::store::BackingStore;

/// In-memory backing store.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a zip bundle from disk and merge its entries into the store.
    ///
    /// Entries already present under the same name are replaced. Returns the
    /// number of entries ingested.
    pub async fn load(&self, bundle: impl AsRef<Path>) -> VfsResult<usize> {
        let bundle = bundle.as_ref();
        let raw = tokio::fs::read(bundle).await?;
        let count = self.load_bytes(Bytes::from(raw))?;
        tracing::debug!(bundle = %bundle.display(), count, "loaded store bundle");
        Ok(count)
    }

    /// Merge the entries of an in-memory zip bundle into the store.
    pub fn load_bytes(&self, raw: Bytes) -> VfsResult<usize> {
        let mut archive = zip::ZipArchive::new(Cursor::new(raw))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            if file.is_dir() {
                entries.push((name, Bytes::new()));
            } else {
                let mut buf = Vec::with_capacity(capacity_hint(file.size()));
                file.read_to_end(&mut buf)?;
                entries.push((name, Bytes::from(buf)));
            }
        }

        let count = entries.len();
        let mut data = self.data.write();
        for (name, contents) in entries {
            if let Some(dir) = name.strip_suffix('/') {
                Self::ensure_dirs(&mut data, dir);
            } else {
                if let Some(parent) = path::parent(&name) {
                    Self::ensure_dirs(&mut data, parent);
                }
                data.insert(name, contents);
            }
        }
        Ok(count)
    }

    /// Insert a file, creating directory markers for its parents.
    pub fn insert_file(&self, file_path: &str, contents: impl Into<Bytes>) {
        let file_path = path::normalize(file_path).to_string();
        let mut data = self.data.write();
        if let Some(parent) = path::parent(&file_path) {
            Self::ensure_dirs(&mut data, parent);
        }
        data.insert(file_path, contents.into());
    }

    /// Insert a directory marker (and markers for its parents).
    pub fn insert_dir(&self, dir: &str) {
        let mut data = self.data.write();
        Self::ensure_dirs(&mut data, path::normalize(dir));
    }

    /// Remove a file. Returns true if it existed.
    pub fn remove_file(&self, file_path: &str) -> bool {
        self.data.write().remove(path::normalize(file_path)).is_some()
    }

    /// Number of entries, directory markers included.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn ensure_dirs(data: &mut BTreeMap<String, Bytes>, dir: &str) {
        let mut current = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            current.push_str(segment);
            current.push('/');
            data.entry(current.clone()).or_default();
        }
    }

    fn is_root(path: &str) -> bool {
        path.is_empty() || path == "."
    }

    /// Prefix under which a directory's children are keyed.
    fn child_prefix(dir: &str) -> String {
        if Self::is_root(dir) {
            String::new()
        } else {
            format!("{dir}/")
        }
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn directory_exists(&self, dir: &str) -> bool {
        let dir = path::normalize(dir);
        Self::is_root(dir) || self.data.read().contains_key(&format!("{dir}/"))
    }

    async fn file_exists(&self, file_path: &str) -> bool {
        let file_path = path::normalize(file_path);
        !Self::is_root(file_path) && self.data.read().contains_key(file_path)
    }

    async fn read(&self, file_path: &str) -> VfsResult<Bytes> {
        let normalized = path::normalize(file_path);
        self.data
            .read()
            .get(normalized)
            .cloned()
            .ok_or_else(|| {
                VfsError::not_found(format!("{file_path} (normalized as {normalized})"))
            })
    }

    async fn list_files(&self, dir: &str) -> VfsResult<Vec<String>> {
        let prefix = Self::child_prefix(path::normalize(dir));
        let data = self.data.read();
        Ok(data
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| {
                let rest = &key[prefix.len()..];
                !rest.is_empty() && !rest.contains('/')
            })
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn list_directories(&self, dir: &str) -> VfsResult<Vec<String>> {
        let prefix = Self::child_prefix(path::normalize(dir));
        let data = self.data.read();
        Ok(data
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, contents)| {
                let rest = &key[prefix.len()..];
                contents.is_empty()
                    && rest
                        .strip_suffix('/')
                        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
            })
            .map(|(key, _)| key[..key.len() - 1].to_string())
            .collect())
    }
}
