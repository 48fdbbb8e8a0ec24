//! File index: logical path → candidate packages, in priority order.
//!
//! A cache over the mount table built from each package's `contents` at
//! mount time. Entries can go stale when package contents change, so callers
//! re-check containment against the live package before trusting a hit.

use std::collections::HashMap;

use crate::package::{PackageHandle, same_package};

#[derive(Default)]
pub(crate) struct FileIndex {
    files: HashMap<String, Vec<PackageHandle>>,
}

impl FileIndex {
    /// Add `package` at the back of every listed path's candidates.
    pub fn append(&mut self, package: &PackageHandle, paths: &[String]) {
        for path in paths {
            let candidates = self.files.entry(path.clone()).or_default();
            if !candidates.iter().any(|p| same_package(p, package)) {
                candidates.push(package.clone());
            }
        }
    }

    /// Move `package` to the front of every listed path's candidates.
    pub fn promote(&mut self, package: &PackageHandle, paths: &[String]) {
        for path in paths {
            let candidates = self.files.entry(path.clone()).or_default();
            candidates.retain(|p| !same_package(p, package));
            candidates.insert(0, package.clone());
        }
    }

    /// Drop every reference to `package`. Returns how many paths lost it.
    pub fn remove_package(&mut self, package: &PackageHandle) -> usize {
        let mut patched = 0;
        self.files.retain(|_, candidates| {
            let before = candidates.len();
            candidates.retain(|p| !same_package(p, package));
            if candidates.len() != before {
                patched += 1;
            }
            !candidates.is_empty()
        });
        patched
    }

    /// Candidates for `path`, highest priority first.
    pub fn candidates(&self, path: &str) -> &[PackageHandle] {
        self.files.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Number of indexed paths.
    pub fn len(&self) -> usize {
        self.files.len()
    }
}
