//! Mount table: reference-counted package entries in resolution order.

use crate::package::{PackageHandle, same_package};

/// What to mount: a target string or an already-opened package.
///
/// Target strings follow the mount syntax: a leading `~` makes the mount
/// optional, a leading `$` names an installed mod instead of a path.
#[derive(Clone)]
pub enum MountTarget {
    /// A literal path or mod reference, resolved at mount time.
    ByName(String),
    /// A package the caller already holds.
    Resolved(PackageHandle),
}

impl std::fmt::Debug for MountTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByName(name) => f.debug_tuple("ByName").field(name).finish(),
            Self::Resolved(package) => f.debug_tuple("Resolved").field(&package.name()).finish(),
        }
    }
}

impl From<&str> for MountTarget {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

impl From<PackageHandle> for MountTarget {
    fn from(package: PackageHandle) -> Self {
        Self::Resolved(package)
    }
}

impl From<&PackageHandle> for MountTarget {
    fn from(package: &PackageHandle) -> Self {
        Self::Resolved(package.clone())
    }
}

/// Information about a mounted package.
#[derive(Debug, Clone)]
pub struct MountInfo {
    /// Package name.
    pub name: String,
    /// How many times the package is mounted.
    pub ref_count: usize,
    /// Explicit alias bound to the package, if any.
    pub alias: Option<String>,
    /// Whether ordinary (non-aliased) lookups reach this package.
    pub global: bool,
}

#[derive(Clone)]
pub(crate) struct MountEntry {
    pub package: PackageHandle,
    pub ref_count: usize,
    /// Mounted at least once without an alias.
    pub global: bool,
}

/// Mounted packages, earliest (highest priority) first.
#[derive(Default)]
pub(crate) struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn find_mut(&mut self, package: &PackageHandle) -> Option<&mut MountEntry> {
        self.entries
            .iter_mut()
            .find(|entry| same_package(&entry.package, package))
    }

    pub fn contains(&self, package: &PackageHandle) -> bool {
        self.position(package).is_some()
    }

    pub fn push(&mut self, entry: MountEntry) {
        self.entries.push(entry);
    }

    /// Move a package to the head of the resolution order.
    pub fn promote(&mut self, package: &PackageHandle) {
        if let Some(i) = self.position(package) {
            let entry = self.entries.remove(i);
            self.entries.insert(0, entry);
        }
    }

    /// Move a package to the tail of the resolution order.
    pub fn demote(&mut self, package: &PackageHandle) {
        if let Some(i) = self.position(package) {
            let entry = self.entries.remove(i);
            self.entries.push(entry);
        }
    }

    pub fn remove(&mut self, package: &PackageHandle) -> Option<MountEntry> {
        self.position(package).map(|i| self.entries.remove(i))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountEntry> {
        self.entries.iter()
    }

    /// Packages reachable by ordinary lookup, in resolution order.
    pub fn global_packages(&self) -> impl Iterator<Item = &PackageHandle> {
        self.entries
            .iter()
            .filter(|entry| entry.global)
            .map(|entry| &entry.package)
    }

    fn position(&self, package: &PackageHandle) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| same_package(&entry.package, package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticPackage;
    use std::sync::Arc;

    fn entry(package: &PackageHandle, global: bool) -> MountEntry {
        MountEntry {
            package: package.clone(),
            ref_count: 1,
            global,
        }
    }

    #[test]
    fn test_identity_not_name() {
        let a: PackageHandle = Arc::new(StaticPackage::new("same", &[]));
        let b: PackageHandle = Arc::new(StaticPackage::new("same", &[]));

        let mut table = MountTable::default();
        table.push(entry(&a, true));
        assert!(table.contains(&a));
        assert!(!table.contains(&b));
        assert!(table.find_mut(&b).is_none());
    }

    #[test]
    fn test_promote_and_remove() {
        let a: PackageHandle = Arc::new(StaticPackage::new("a", &[]));
        let b: PackageHandle = Arc::new(StaticPackage::new("b", &[]));
        let c: PackageHandle = Arc::new(StaticPackage::new("c", &[]));

        let mut table = MountTable::default();
        table.push(entry(&a, true));
        table.push(entry(&b, false));
        table.push(entry(&c, true));

        table.demote(&a);
        table.promote(&c);
        let order: Vec<_> = table.iter().map(|e| e.package.name().to_string()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);

        let globals: Vec<_> = table.global_packages().map(|p| p.name().to_string()).collect();
        assert_eq!(globals, vec!["c", "a"]);

        table.demote(&c);
        let order: Vec<_> = table.iter().map(|e| e.package.name().to_string()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);

        assert!(table.remove(&a).is_some());
        assert!(table.remove(&a).is_none());
        assert_eq!(table.len(), 2);

        table.clear();
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_target_conversions() {
        assert!(matches!(MountTarget::from("~bits.zip"), MountTarget::ByName(n) if n == "~bits.zip"));
        let package: PackageHandle = Arc::new(StaticPackage::new("p", &[]));
        assert!(matches!(MountTarget::from(&package), MountTarget::Resolved(_)));
    }
}
