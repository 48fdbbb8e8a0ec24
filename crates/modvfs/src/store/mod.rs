//! Backing stores: the raw byte and listing providers under the VFS.
//!
//! A store exposes a flat namespace of `/`-separated paths. It owns all real
//! I/O; packages only ever ask it questions through [`BackingStore`].
//!
//! - [`MemoryStore`] - In-memory namespace, filled from a zip bundle
//! - [`LocalStore`] - Directory on disk (with path security)

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::VfsResult;

/// Raw byte and listing queries over a flat path namespace.
///
/// Implementations normalize every incoming path with
/// [`crate::path::normalize`] before lookup.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Returns true if `path` is a directory. The empty path is always one.
    async fn directory_exists(&self, path: &str) -> bool;

    /// Returns true if `path` is a readable file.
    async fn file_exists(&self, path: &str) -> bool;

    /// Read the whole file. Fails with [`crate::VfsError::NotFound`] if absent.
    async fn read(&self, path: &str) -> VfsResult<Bytes>;

    /// Immediate child files of a directory, as full store paths.
    async fn list_files(&self, dir: &str) -> VfsResult<Vec<String>>;

    /// Immediate child directories of a directory, as full store paths
    /// without a trailing `/`.
    async fn list_directories(&self, dir: &str) -> VfsResult<Vec<String>>;

    /// Returns true if `path` is a file or a directory.
    async fn exists(&self, path: &str) -> bool {
        self.directory_exists(path).await || self.file_exists(path).await
    }
}

/// Shared handle to a backing store.
pub type StoreHandle = Arc<dyn BackingStore>;
