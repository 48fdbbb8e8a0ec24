//! The overlay filesystem.
//!
//! [`VirtualFileSystem`] owns the mount table, the alias table, and the file
//! index, and resolves logical paths against them:
//!
//! 1. `alias|path` goes straight to the aliased package and nowhere else
//! 2. Otherwise the file index is consulted, re-checking each candidate
//! 3. Otherwise every globally mounted package is scanned in mount order
//!
//! Packages mounted with an alias live only in their namespace. Mounting the
//! same instance again without an alias makes it global.

mod index;
mod mount;

pub use mount::{MountInfo, MountTarget};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{VfsError, VfsResult};
use crate::manifest::{InstalledMods, Manifest};
use crate::package::{
    DirectoryPackage, PackageContext, PackageHandle, PackageLoader, PackageLoaders, same_package,
};
use crate::path::{self, TargetSpec};
use crate::store::StoreHandle;

use index::FileIndex;
use mount::{MountEntry, MountTable};

/// A package and the path to use inside it.
#[derive(Debug, Clone)]
pub struct PackageMatch {
    /// The package holding the file.
    pub package: PackageHandle,
    /// Path relative to `package`.
    pub path: String,
}

/// Overlay of mounted packages over a backing store.
///
/// Reads take `&self`; mounting and unmounting take `&mut self`. Wrap in a
/// lock to share across tasks.
pub struct VirtualFileSystem {
    store: StoreHandle,
    mod_id: String,
    installed_mods: InstalledMods,
    loaders: PackageLoaders,
    mounts: MountTable,
    aliases: HashMap<String, PackageHandle>,
    index: FileIndex,
    /// Root packages of mods mounted via `$id`.
    mod_packages: Vec<PackageHandle>,
}

impl std::fmt::Debug for VirtualFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualFileSystem")
            .field("mod_id", &self.mod_id)
            .field("mounts", &self.mounts.len())
            .field("aliases", &self.aliases.len())
            .field("indexed_paths", &self.index.len())
            .field("loaders", &self.loaders)
            .finish()
    }
}

impl VirtualFileSystem {
    /// Create an empty overlay over `store` with only the archive loader.
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            mod_id: String::new(),
            installed_mods: InstalledMods::new(),
            loaders: PackageLoaders::default(),
            mounts: MountTable::default(),
            aliases: HashMap::new(),
            index: FileIndex::default(),
            mod_packages: Vec::new(),
        }
    }

    /// Set the active mod and the installed mods `$id` targets resolve to.
    pub fn with_mods(mut self, mod_id: impl Into<String>, installed_mods: InstalledMods) -> Self {
        self.mod_id = mod_id.into();
        self.installed_mods = installed_mods;
        self
    }

    /// Register a caller loader. Caller loaders run before the archive loader.
    pub fn with_loader(mut self, loader: Arc<dyn PackageLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// The backing store.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Id of the active mod.
    pub fn mod_id(&self) -> &str {
        &self.mod_id
    }

    /// Installed mods, sorted by id.
    pub fn installed_mods(&self) -> &InstalledMods {
        &self.installed_mods
    }

    /// Open `path` as a package.
    ///
    /// Resolution order: a directory of the backing store, then a package
    /// reachable through the mounted overlay (so nested archives work), then
    /// the file's bytes sniffed by the loaders. Returns `Ok(None)` when the
    /// bytes exist but no loader recognizes them.
    pub async fn open_package(&self, path: &str) -> VfsResult<Option<PackageHandle>> {
        if !path::is_namespaced(path) {
            if let Some(resolved) = path::resolve(path) {
                if self.store.directory_exists(&resolved).await {
                    return Ok(Some(Arc::new(DirectoryPackage::new(
                        self.store.clone(),
                        resolved,
                    ))));
                }
            }
        }

        if let Some(found) = self.try_get_package_containing(path).await {
            return found.package.open_package(&found.path, self).await;
        }

        let data = self.open(path).await?;
        let package = self.loaders.parse(data, path, self).await?;
        if let Some(package) = &package {
            tracing::info!(path, package = %package.name(), "parsed as package");
        }
        Ok(package)
    }

    /// Like [`Self::open_package`], but unrecognized data is an error.
    pub async fn open_package_required(&self, path: &str) -> VfsResult<PackageHandle> {
        self.open_package(path)
            .await?
            .ok_or_else(|| VfsError::UnsupportedFormat(path.to_string()))
    }

    /// Mount a package, optionally under an alias.
    ///
    /// Target strings are resolved first: `~` swallows every failure, `$id`
    /// mounts an installed mod's root package, anything else goes through
    /// [`Self::open_package`]. Mounting an already-mounted instance bumps its
    /// reference count.
    pub async fn mount(
        &mut self,
        target: impl Into<MountTarget>,
        alias: Option<&str>,
    ) -> VfsResult<()> {
        match target.into() {
            MountTarget::Resolved(package) => self.mount_resolved(package, alias).await,
            MountTarget::ByName(name) => {
                let spec = path::parse_target(&name);
                match self.mount_named(spec, alias).await {
                    Err(e) if spec.optional => {
                        tracing::debug!(mount_target = %name, error = %e, "skipped optional mount");
                        Ok(())
                    }
                    result => result,
                }
            }
        }
    }

    async fn mount_named(&mut self, spec: TargetSpec<'_>, alias: Option<&str>) -> VfsResult<()> {
        if spec.is_mod {
            let package = match self.installed_mods.get(spec.name) {
                Some(manifest) => manifest.package.clone(),
                None => {
                    return Err(VfsError::mod_not_found(
                        spec.name,
                        self.installed_mods.keys(),
                    ));
                }
            };
            self.mount_resolved(package.clone(), alias).await?;
            if !self.mod_packages.iter().any(|p| same_package(p, &package)) {
                self.mod_packages.push(package);
            }
            return Ok(());
        }

        let package = match self.open_package(spec.name).await {
            Ok(Some(package)) => package,
            Ok(None) => return Err(VfsError::package_open(spec.name)),
            Err(e) if e.is_not_found() => return Err(VfsError::package_open(spec.name)),
            Err(e) => return Err(e),
        };
        self.mount_resolved(package, alias).await
    }

    /// Mount an already-opened package.
    ///
    /// Without an alias the package's contents are indexed. A global remount
    /// moves the package ahead of everything mounted so far; the first
    /// global mount of an alias-only package ranks it behind them.
    pub async fn mount_resolved(
        &mut self,
        package: PackageHandle,
        alias: Option<&str>,
    ) -> VfsResult<()> {
        let global = alias.is_none();
        let contents = if global {
            Some(package.contents().await?)
        } else {
            None
        };

        let ref_count = match self.mounts.find_mut(&package) {
            Some(entry) => {
                entry.ref_count += 1;
                let was_global = entry.global;
                entry.global |= global;
                let ref_count = entry.ref_count;
                if let Some(contents) = &contents {
                    if was_global {
                        self.index.promote(&package, contents);
                        self.mounts.promote(&package);
                    } else {
                        // First global mount: rank last, as the index does.
                        self.index.append(&package, contents);
                        self.mounts.demote(&package);
                    }
                }
                ref_count
            }
            None => {
                self.mounts.push(MountEntry {
                    package: package.clone(),
                    ref_count: 1,
                    global,
                });
                if let Some(contents) = &contents {
                    self.index.append(&package, contents);
                }
                1
            }
        };

        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string(), package.clone());
        }

        tracing::debug!(
            package = %package.name(),
            alias,
            ref_count,
            indexed = contents.as_ref().map_or(0, Vec::len),
            "mounted package"
        );
        Ok(())
    }

    /// Drop one reference to `package`.
    ///
    /// At zero references the package leaves the mount table, the index, and
    /// every alias pointing at it. Returns false if it was not mounted.
    pub fn unmount(&mut self, package: &PackageHandle) -> bool {
        let Some(entry) = self.mounts.find_mut(package) else {
            return false;
        };

        entry.ref_count -= 1;
        let ref_count = entry.ref_count;
        if ref_count == 0 {
            self.mounts.remove(package);
            let patched = self.index.remove_package(package);
            self.aliases.retain(|_, p| !same_package(p, package));
            self.mod_packages.retain(|p| !same_package(p, package));
            tracing::debug!(package = %package.name(), patched, "unmounted package");
        } else {
            tracing::debug!(package = %package.name(), ref_count, "released package reference");
        }
        true
    }

    /// Drop every mount, alias, and index entry.
    pub fn unmount_all(&mut self) {
        let count = self.mounts.len();
        self.mounts.clear();
        self.aliases.clear();
        self.index.clear();
        self.mod_packages.clear();
        if count > 0 {
            tracing::debug!(count, "unmounted all packages");
        }
    }

    /// Replace the mounted set with a manifest's package list.
    ///
    /// Packages are mounted in manifest order. Stops at the first failing
    /// non-optional target; earlier mounts stay in place.
    pub async fn load_from_manifest(&mut self, manifest: &Manifest) -> VfsResult<()> {
        self.unmount_all();
        for (target, alias) in manifest.mounts() {
            self.mount(target, alias).await?;
        }
        tracing::debug!(
            mod_id = %manifest.id,
            mounts = self.mounts.len(),
            "loaded manifest"
        );
        Ok(())
    }

    /// Load the active mod's manifest.
    pub async fn load_active_mod(&mut self) -> VfsResult<()> {
        let manifest = self
            .installed_mods
            .get(&self.mod_id)
            .cloned()
            .ok_or_else(|| VfsError::mod_not_found(&self.mod_id, self.installed_mods.keys()))?;
        self.load_from_manifest(&manifest).await
    }

    /// Read a file, failing if no mounted package holds it.
    pub async fn open(&self, path: &str) -> VfsResult<Bytes> {
        self.try_open(path)
            .await?
            .ok_or_else(|| VfsError::file_not_found(path))
    }

    /// Read a file, or `None` if no mounted package holds it.
    ///
    /// A namespaced path that misses in its alias does not fall back to the
    /// global search.
    pub async fn try_open(&self, path: &str) -> VfsResult<Option<Bytes>> {
        if let Some((alias, relative)) = path::split_namespace(path) {
            return match self.aliases.get(alias) {
                Some(package) => package.get_stream(relative).await,
                None => Ok(None),
            };
        }

        match self.find_global(path).await {
            Some(package) => package.get_stream(path).await,
            None => Ok(None),
        }
    }

    /// Returns true if [`Self::try_open`] would find `path`.
    pub async fn exists(&self, path: &str) -> bool {
        if let Some((alias, relative)) = path::split_namespace(path) {
            return match self.aliases.get(alias) {
                Some(package) => package.contains(relative).await,
                None => false,
            };
        }
        self.find_global(path).await.is_some()
    }

    /// Find the package that would serve `path`, and the path inside it.
    ///
    /// Namespaced paths return the aliased package without checking that it
    /// holds the file. Ordinary paths consult the index only.
    pub async fn try_get_package_containing(&self, path: &str) -> Option<PackageMatch> {
        if let Some((alias, relative)) = path::split_namespace(path) {
            if let Some(package) = self.aliases.get(alias) {
                return Some(PackageMatch {
                    package: package.clone(),
                    path: relative.to_string(),
                });
            }
        }

        self.find_indexed(path).await.map(|package| PackageMatch {
            package,
            path: path.to_string(),
        })
    }

    /// Returns true if `path` is namespaced into a mod other than the active
    /// one.
    pub fn is_external_mod_file(&self, path: &str) -> bool {
        let Some((alias, _)) = path::split_namespace(path) else {
            return false;
        };
        let Some(package) = self.aliases.get(alias) else {
            return false;
        };

        if let Some(active) = self.installed_mods.get(&self.mod_id) {
            if same_package(&active.package, package) {
                return false;
            }
        }
        self.mod_packages.iter().any(|p| same_package(p, package))
    }

    /// An alias bound to `package`, if any.
    pub fn alias_of(&self, package: &PackageHandle) -> Option<&str> {
        let mut aliases: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, p)| same_package(p, package))
            .map(|(alias, _)| alias.as_str())
            .collect();
        aliases.sort_unstable();
        aliases.first().copied()
    }

    /// Mounted packages in resolution order.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .iter()
            .map(|entry| MountInfo {
                name: entry.package.name().to_string(),
                ref_count: entry.ref_count,
                alias: self.alias_of(&entry.package).map(str::to_string),
                global: entry.global,
            })
            .collect()
    }

    /// Number of distinct mounted packages.
    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Returns true if this exact package instance is mounted.
    pub fn is_mounted(&self, package: &PackageHandle) -> bool {
        self.mounts.contains(package)
    }

    /// First indexed candidate that still holds `path`.
    async fn find_indexed(&self, path: &str) -> Option<PackageHandle> {
        for package in self.index.candidates(path) {
            if package.contains(path).await {
                return Some(package.clone());
            }
        }
        None
    }

    /// Index lookup, then a linear scan of global mounts.
    async fn find_global(&self, path: &str) -> Option<PackageHandle> {
        if let Some(package) = self.find_indexed(path).await {
            return Some(package);
        }
        for package in self.mounts.global_packages() {
            if package.contains(path).await {
                return Some(package.clone());
            }
        }
        None
    }
}

#[async_trait]
impl PackageContext for VirtualFileSystem {
    async fn try_parse_package(
        &self,
        data: Bytes,
        filename: &str,
    ) -> VfsResult<Option<PackageHandle>> {
        self.loaders.parse(data, filename, self).await
    }
}
