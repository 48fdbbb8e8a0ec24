//! Mod manifests: the ordered package list a mod mounts.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::package::PackageHandle;

/// Installed mods keyed by id. Iteration is sorted, which keeps
/// "available mods" listings stable.
pub type InstalledMods = BTreeMap<String, Manifest>;

/// A mod's identity, its root package, and the packages it mounts.
#[derive(Clone)]
pub struct Manifest {
    /// Mod id, referenced by `$id` mount targets.
    pub id: String,
    /// Root package of the mod.
    pub package: PackageHandle,
    /// Mount target → alias, mounted in insertion order. An empty alias
    /// mounts the target globally.
    pub packages: IndexMap<String, String>,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("id", &self.id)
            .field("package", &self.package.name())
            .field("packages", &self.packages)
            .finish()
    }
}

impl Manifest {
    /// Create a manifest with no packages.
    pub fn new(id: impl Into<String>, package: PackageHandle) -> Self {
        Self {
            id: id.into(),
            package,
            packages: IndexMap::new(),
        }
    }

    /// Append a mount target. Re-adding a target keeps its original position
    /// and replaces the alias.
    pub fn with_package(mut self, target: impl Into<String>, alias: impl Into<String>) -> Self {
        self.packages.insert(target.into(), alias.into());
        self
    }

    /// Mount targets in order, with `None` for global mounts.
    pub fn mounts(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.packages
            .iter()
            .map(|(target, alias)| (target.as_str(), (!alias.is_empty()).then_some(alias.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticPackage;
    use std::sync::Arc;

    #[test]
    fn test_mounts_preserve_order() {
        let root: PackageHandle = Arc::new(StaticPackage::new("mods/ra", &[]));
        let manifest = Manifest::new("ra", root)
            .with_package("$ra", "ra")
            .with_package("~main.zip", "")
            .with_package("bits.zip", "")
            .with_package("$ra", "core");

        let mounts: Vec<_> = manifest.mounts().collect();
        assert_eq!(
            mounts,
            vec![("$ra", Some("core")), ("~main.zip", None), ("bits.zip", None)]
        );
        assert_eq!(manifest.id, "ra");
    }

    #[test]
    fn test_installed_mods_sorted() {
        let mut mods = InstalledMods::new();
        for id in ["ts", "cnc", "ra"] {
            let root: PackageHandle = Arc::new(StaticPackage::new(id, &[]));
            mods.insert(id.to_string(), Manifest::new(id, root));
        }
        let ids: Vec<_> = mods.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["cnc", "ra", "ts"]);
    }
}
