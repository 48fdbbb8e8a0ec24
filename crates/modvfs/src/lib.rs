//! # modvfs
//!
//! Overlay virtual filesystem for mod-based game assets.
//!
//! Content comes from packages: directories in a backing store, zip-format
//! archives, and folders inside archives. Archives may nest, so a package
//! can be opened from a file inside another package. Mounted packages are
//! layered in mount order and a logical path resolves to the first package
//! that holds it.
//!
//! - Ordinary paths (`rules.yaml`) search every globally mounted package
//! - Namespaced paths (`core|rules.yaml`) address one aliased package
//! - Mount targets accept `~` (optional) and `$id` (installed mod) markers
//!
//! ```text
//! VirtualFileSystem
//!   ├── MountTable   package → ref count, resolution order
//!   ├── aliases      alias → package
//!   ├── FileIndex    path → candidate packages
//!   └── PackageLoaders
//!         ├── caller loaders
//!         └── ArchiveLoader
//! ```

pub mod error;
pub mod manifest;
pub mod package;
pub mod path;
pub mod store;
pub mod vfs;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{VfsError, VfsResult};
pub use manifest::{InstalledMods, Manifest};
pub use package::{
    ArchiveFolder, ArchiveLoader, ArchivePackage, DirectoryPackage, Package, PackageContext,
    PackageHandle, PackageLoader, PackageLoaders, same_package,
};
pub use store::{BackingStore, LocalStore, MemoryStore, StoreHandle};
pub use vfs::{MountInfo, MountTarget, PackageMatch, VirtualFileSystem};
