//! Directory packages: a directory of the backing store, served as-is.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::VfsResult;
use crate::package::{Package, PackageContext, PackageHandle};
use crate::path;
use crate::store::StoreHandle;

/// A package rooted at a directory of the backing store.
///
/// Paths are resolved under `root`; anything that resolves outside it (via
/// `..`) is treated as absent.
pub struct DirectoryPackage {
    store: StoreHandle,
    root: String,
}

impl std::fmt::Debug for DirectoryPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryPackage")
            .field("root", &self.root)
            .finish()
    }
}

impl DirectoryPackage {
    /// Create a package over `root` in `store`.
    pub fn new(store: StoreHandle, root: impl AsRef<str>) -> Self {
        let root = path::normalize(root.as_ref()).to_string();
        Self { store, root }
    }

    /// Store path of the package root.
    pub fn root(&self) -> &str {
        &self.root
    }

    fn child(&self, path: &str) -> Option<String> {
        path::join_under(&self.root, path)
    }

    fn relative<'a>(&self, store_path: &'a str) -> &'a str {
        if self.root.is_empty() {
            return store_path;
        }
        store_path
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(store_path)
    }
}

#[async_trait]
impl Package for DirectoryPackage {
    fn name(&self) -> &str {
        &self.root
    }

    async fn contents(&self) -> VfsResult<Vec<String>> {
        let files = self.store.list_files(&self.root).await?;
        let dirs = self.store.list_directories(&self.root).await?;
        Ok(files
            .iter()
            .chain(dirs.iter())
            .map(|p| self.relative(p).to_string())
            .collect())
    }

    async fn get_stream(&self, path: &str) -> VfsResult<Option<Bytes>> {
        let Some(full) = self.child(path) else {
            return Ok(None);
        };
        match self.store.read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn contains(&self, path: &str) -> bool {
        match self.child(path) {
            Some(full) => self.store.file_exists(&full).await,
            None => false,
        }
    }

    async fn open_package(
        &self,
        path: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>> {
        let Some(full) = self.child(path) else {
            return Ok(None);
        };

        if self.store.directory_exists(&full).await {
            return Ok(Some(Arc::new(DirectoryPackage::new(self.store.clone(), full))));
        }

        match self.get_stream(path).await? {
            Some(data) => context.try_parse_package(data, path).await,
            None => Ok(None),
        }
    }
}
