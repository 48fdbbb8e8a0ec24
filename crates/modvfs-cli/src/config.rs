//! RON configuration: backing store, active mod, installed mods.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use modvfs::{DirectoryPackage, InstalledMods, LocalStore, Manifest, MemoryStore, StoreHandle};

/// Where asset bytes come from.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub enum StoreConfig {
    /// A zip bundle loaded into memory.
    Bundle(PathBuf),
    /// A directory on disk.
    Directory(PathBuf),
}

/// One installed mod.
#[derive(Debug, Clone, Deserialize)]
pub struct ModConfig {
    /// Store path of the mod's root directory.
    pub root: String,
    /// Mount target → alias, in mount order. Empty alias mounts globally.
    #[serde(default)]
    pub packages: IndexMap<String, String>,
}

/// Top-level config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub active_mod: String,
    #[serde(default)]
    pub mods: IndexMap<String, ModConfig>,
}

impl Config {
    /// Read and parse a config file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Build the backing store. Relative paths resolve against `base`.
    pub async fn build_store(&self, base: &Path) -> Result<StoreHandle> {
        match &self.store {
            StoreConfig::Bundle(bundle) => {
                let bundle = base.join(bundle);
                let store = MemoryStore::new();
                let count = store
                    .load(&bundle)
                    .await
                    .with_context(|| format!("loading bundle {}", bundle.display()))?;
                tracing::info!(bundle = %bundle.display(), count, "loaded asset bundle");
                Ok(Arc::new(store))
            }
            StoreConfig::Directory(dir) => {
                let dir = base.join(dir);
                tracing::info!(dir = %dir.display(), "using directory store");
                Ok(Arc::new(LocalStore::new(dir)))
            }
        }
    }

    /// Manifests for every configured mod, rooted in `store`.
    pub fn installed_mods(&self, store: &StoreHandle) -> InstalledMods {
        self.mods
            .iter()
            .map(|(id, config)| {
                let root = Arc::new(DirectoryPackage::new(store.clone(), &config.root));
                let manifest = config
                    .packages
                    .iter()
                    .fold(Manifest::new(id.clone(), root), |manifest, (target, alias)| {
                        manifest.with_package(target.clone(), alias.clone())
                    });
                (id.clone(), manifest)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"(
        store: Directory("assets"),
        active_mod: "ra",
        mods: {
            "ra": (
                root: "mods/ra",
                packages: {
                    "$ra": "ra",
                    "mods/ra": "",
                    "~bits.zip": "",
                },
            ),
            "cnc": (root: "mods/cnc"),
        },
    )"#;

    #[test]
    fn test_parse_preserves_package_order() {
        let config = Config::parse(EXAMPLE).unwrap();
        assert_eq!(config.store, StoreConfig::Directory(PathBuf::from("assets")));
        assert_eq!(config.active_mod, "ra");

        let ra = &config.mods["ra"];
        let targets: Vec<_> = ra.packages.keys().map(String::as_str).collect();
        assert_eq!(targets, vec!["$ra", "mods/ra", "~bits.zip"]);
        assert!(config.mods["cnc"].packages.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_store() {
        let bad = r#"(store: Ftp("host"), active_mod: "ra")"#;
        assert!(Config::parse(bad).is_err());
    }

    #[tokio::test]
    async fn test_installed_mods_from_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets/mods/ra")).unwrap();
        std::fs::write(dir.path().join("assets/mods/ra/rules.yaml"), "ra").unwrap();

        let config = Config::parse(EXAMPLE).unwrap();
        let store = config.build_store(dir.path()).await.unwrap();
        let mods = config.installed_mods(&store);

        let ids: Vec<_> = mods.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["cnc", "ra"]);
        let ra = &mods["ra"];
        assert_eq!(ra.package.name(), "mods/ra");
        assert_eq!(ra.packages.len(), 3);
        assert!(ra.package.contains("rules.yaml").await);
    }
}
