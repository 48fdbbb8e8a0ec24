//! Local filesystem backing store.
//!
//! Serves a real directory as the store namespace, with path security to
//! prevent escaping the root directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::store::BackingStore;

/// Local filesystem backing store.
///
/// All store paths are relative to `root`. For example, if `root` is
/// `/opt/game/content`, then `read("mods/ra/mod.yaml")` reads
/// `/opt/game/content/mods/ra/mod.yaml`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the given directory.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..` or a symlink).
    fn resolve(&self, store_path: &str) -> VfsResult<PathBuf> {
        let relative = path::resolve(path::normalize(store_path))
            .ok_or_else(|| VfsError::path_escapes_root(store_path))?;

        let full = self.root.join(&relative);
        if full.exists() {
            let canonical = full.canonicalize()?;
            if !canonical.starts_with(&self.root) {
                return Err(VfsError::path_escapes_root(format!(
                    "{} is not under {}",
                    canonical.display(),
                    self.root.display()
                )));
            }
            return Ok(canonical);
        }
        Ok(full)
    }

    /// Store path of a child entry.
    fn child_path(dir: &str, name: &str) -> String {
        let dir = path::normalize(dir);
        if dir.is_empty() || dir == "." {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        }
    }

    async fn list(&self, dir: &str, want_dirs: bool) -> VfsResult<Vec<String>> {
        let full = self.resolve(dir)?;
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&full).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            if is_dir == want_dirs {
                let name = entry.file_name().to_string_lossy().into_owned();
                entries.push(Self::child_path(dir, &name));
            }
        }

        entries.sort();
        Ok(entries)
    }
}

#[async_trait]
impl BackingStore for LocalStore {
    async fn directory_exists(&self, dir: &str) -> bool {
        match self.resolve(dir) {
            Ok(full) => fs::metadata(&full).await.is_ok_and(|m| m.is_dir()),
            Err(_) => false,
        }
    }

    async fn file_exists(&self, file_path: &str) -> bool {
        match self.resolve(file_path) {
            Ok(full) => fs::metadata(&full).await.is_ok_and(|m| m.is_file()),
            Err(_) => false,
        }
    }

    async fn read(&self, file_path: &str) -> VfsResult<Bytes> {
        let full = self.resolve(file_path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VfsError::not_found(file_path))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self, dir: &str) -> VfsResult<Vec<String>> {
        self.list(dir, false).await
    }

    async fn list_directories(&self, dir: &str) -> VfsResult<Vec<String>> {
        self.list(dir, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (LocalStore, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("mods/ra/maps")).unwrap();
        std::fs::write(dir.path().join("mods/ra/mod.yaml"), "Metadata:").unwrap();
        std::fs::write(dir.path().join("mods/ra/rules.yaml"), "World:").unwrap();
        let store = LocalStore::new(dir.path());
        (store, dir)
    }

    #[tokio::test]
    async fn test_exists_queries() {
        let (store, _dir) = setup();
        assert!(store.directory_exists("").await);
        assert!(store.directory_exists("./mods/ra/").await);
        assert!(!store.directory_exists("mods/ra/mod.yaml").await);
        assert!(store.file_exists("mods/ra/mod.yaml").await);
        assert!(!store.file_exists("mods/ra").await);
        assert!(store.exists("mods/ra/maps").await);
    }

    #[tokio::test]
    async fn test_read() {
        let (store, _dir) = setup();
        let data = store.read("mods/ra/rules.yaml").await.unwrap();
        assert_eq!(&data[..], b"World:");

        let err = store.read("mods/ra/missing.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_listing() {
        let (store, _dir) = setup();
        assert_eq!(
            store.list_files("mods/ra").await.unwrap(),
            vec!["mods/ra/mod.yaml", "mods/ra/rules.yaml"]
        );
        assert_eq!(
            store.list_directories("mods/ra").await.unwrap(),
            vec!["mods/ra/maps"]
        );
        assert_eq!(store.list_directories("").await.unwrap(), vec!["mods"]);
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (store, _dir) = setup();
        let result = store.read("../../../etc/passwd").await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));
        assert!(!store.file_exists("mods/../../outside").await);
    }
}
