//! Packages: the mountable units of read-only content.
//!
//! - [`Package`] - Capability trait every package implements
//! - [`DirectoryPackage`] - A directory in the backing store
//! - [`ArchivePackage`] - A parsed zip-like container held in memory
//! - [`ArchiveFolder`] - A subtree view into an [`ArchivePackage`]
//! - [`PackageLoaders`] - Ordered format sniffers turning bytes into packages
//!
//! Package paths are relative and `/`-separated. A package never knows where
//! (or whether) it is mounted.

mod archive;
mod directory;
mod loader;

pub use archive::{ArchiveFolder, ArchiveLoader, ArchivePackage};
pub(crate) use archive::capacity_hint;
pub use directory::DirectoryPackage;
pub use loader::{PackageContext, PackageLoader, PackageLoaders};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::VfsResult;

/// Read-only, named container of files.
#[async_trait]
pub trait Package: Send + Sync {
    /// Logical name (root path for directories, filename for archives).
    fn name(&self) -> &str;

    /// Relative paths this package currently holds.
    ///
    /// Recomputed on every call; directory-backed packages re-list the
    /// backing store.
    async fn contents(&self) -> VfsResult<Vec<String>>;

    /// Fetch a file's bytes, or `None` if this package does not hold it.
    async fn get_stream(&self, path: &str) -> VfsResult<Option<Bytes>>;

    /// Returns true if [`Package::get_stream`] would find `path`.
    async fn contains(&self, path: &str) -> bool;

    /// Open `path` inside this package as a nested package.
    ///
    /// Directories become sub-packages directly; files are sniffed through
    /// `context`'s loaders. Returns `None` if `path` is absent or no loader
    /// recognizes it.
    async fn open_package(
        &self,
        path: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>>;
}

/// Shared handle to a package. Identity is the allocation, see [`same_package`].
pub type PackageHandle = Arc<dyn Package>;

/// Returns true if both handles refer to the same package instance.
pub fn same_package(a: &PackageHandle, b: &PackageHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl std::fmt::Debug for dyn Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package").field("name", &self.name()).finish()
    }
}
