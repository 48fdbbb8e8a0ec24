//! Archive packages: zip-like containers parsed into memory.
//!
//! The entry table is built once from the container's central directory;
//! payloads stay compressed until [`Package::get_stream`] asks for one.
//! Directory entries are keys with a trailing `/`.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use zip::{CompressionMethod, ZipArchive};

use crate::error::VfsResult;
use crate::package::{Package, PackageContext, PackageHandle, PackageLoader};
use crate::path;

/// Upper bound on buffer preallocation from a header's declared size.
const MAX_CAPACITY_HINT: usize = 1 << 20;

/// Preallocation for an entry whose header claims `declared` bytes. Headers
/// are untrusted, so the hint is capped; the buffer still grows as needed.
pub(crate) fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared)
        .unwrap_or(usize::MAX)
        .min(MAX_CAPACITY_HINT)
}

/// One row of the parsed entry table.
#[derive(Debug, Clone, Copy)]
struct ArchiveEntry {
    /// Position in the container, `None` for synthesized directory markers.
    index: Option<usize>,
    size: u64,
    compressed_size: u64,
    compression: CompressionMethod,
    is_dir: bool,
}

impl ArchiveEntry {
    fn synthesized_dir() -> Self {
        Self {
            index: None,
            size: 0,
            compressed_size: 0,
            compression: CompressionMethod::Stored,
            is_dir: true,
        }
    }
}

struct ArchiveData {
    name: String,
    entries: BTreeMap<String, ArchiveEntry>,
    reader: Option<Mutex<ZipArchive<Cursor<Bytes>>>>,
}

/// A parsed archive container.
///
/// Cloning is cheap and shares the parsed data; [`ArchiveFolder`] views hold
/// such a clone of their parent.
#[derive(Clone)]
pub struct ArchivePackage {
    data: Arc<ArchiveData>,
}

impl std::fmt::Debug for ArchivePackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivePackage")
            .field("name", &self.data.name)
            .field("entries", &self.data.entries.len())
            .finish()
    }
}

impl ArchivePackage {
    /// Parse an archive's entry table. `None` creates a new empty archive.
    pub fn create(source: Option<Bytes>, name: impl Into<String>) -> VfsResult<Self> {
        let name = name.into();
        let Some(source) = source else {
            return Ok(Self::from_parts(name, BTreeMap::new(), None));
        };

        let mut reader = ZipArchive::new(Cursor::new(source))?;
        let mut entries = BTreeMap::new();

        for i in 0..reader.len() {
            let file = reader.by_index_raw(i)?;
            entries.insert(
                file.name().to_string(),
                ArchiveEntry {
                    index: Some(i),
                    size: file.size(),
                    compressed_size: file.compressed_size(),
                    compression: file.compression(),
                    is_dir: file.is_dir(),
                },
            );
        }

        // Folders named only implicitly by their files still need markers.
        let implied: Vec<String> = entries
            .keys()
            .filter_map(|entry| path::parent(entry.trim_end_matches('/')))
            .flat_map(|dir| {
                let mut prefixes = Vec::new();
                let mut current = String::new();
                for segment in dir.split('/').filter(|s| !s.is_empty()) {
                    current.push_str(segment);
                    current.push('/');
                    prefixes.push(current.clone());
                }
                prefixes
            })
            .collect();
        for dir in implied {
            entries.entry(dir).or_insert_with(ArchiveEntry::synthesized_dir);
        }

        tracing::debug!(archive = %name, entries = entries.len(), "parsed archive entry table");
        Ok(Self::from_parts(name, entries, Some(Mutex::new(reader))))
    }

    fn from_parts(
        name: String,
        entries: BTreeMap<String, ArchiveEntry>,
        reader: Option<Mutex<ZipArchive<Cursor<Bytes>>>>,
    ) -> Self {
        Self {
            data: Arc::new(ArchiveData {
                name,
                entries,
                reader,
            }),
        }
    }

    /// Number of entries, directory markers included.
    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    /// Uncompressed and stored sizes of a file entry.
    pub fn entry_sizes(&self, path: &str) -> Option<(u64, u64)> {
        self.file_entry(path)
            .map(|entry| (entry.size, entry.compressed_size))
    }

    fn file_entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.data.entries.get(path).filter(|entry| !entry.is_dir)
    }

    fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.data.entries.keys().map(String::as_str)
    }

    /// Decompress one entry. Runs without awaiting so the lock never spans a
    /// suspension point.
    fn decompress(&self, path: &str, entry: &ArchiveEntry) -> VfsResult<Option<Bytes>> {
        let (Some(index), Some(reader)) = (entry.index, self.data.reader.as_ref()) else {
            return Ok(None);
        };

        let mut reader = reader.lock();
        let mut file = reader.by_index(index)?;
        let mut buf = Vec::with_capacity(capacity_hint(entry.size));
        file.read_to_end(&mut buf)?;
        tracing::trace!(
            archive = %self.data.name,
            path,
            compression = ?entry.compression,
            size = buf.len(),
            "decompressed entry"
        );
        Ok(Some(Bytes::from(buf)))
    }
}

#[async_trait]
impl Package for ArchivePackage {
    fn name(&self) -> &str {
        &self.data.name
    }

    async fn contents(&self) -> VfsResult<Vec<String>> {
        Ok(self.entry_names().map(str::to_string).collect())
    }

    async fn get_stream(&self, path: &str) -> VfsResult<Option<Bytes>> {
        match self.file_entry(path) {
            Some(entry) => self.decompress(path, entry),
            None => Ok(None),
        }
    }

    async fn contains(&self, path: &str) -> bool {
        self.file_entry(path).is_some()
    }

    async fn open_package(
        &self,
        path: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>> {
        let entry = self
            .data
            .entries
            .get(path)
            .or_else(|| self.data.entries.get(&format!("{path}/")));

        let Some(entry) = entry else {
            return Ok(None);
        };

        if entry.is_dir {
            return Ok(Some(Arc::new(ArchiveFolder::new(self.clone(), path))));
        }

        match self.get_stream(path).await? {
            Some(data) => context.try_parse_package(data, path).await,
            None => Ok(None),
        }
    }
}

/// A subtree of an [`ArchivePackage`], addressed relative to its folder.
#[derive(Debug, Clone)]
pub struct ArchiveFolder {
    parent: ArchivePackage,
    prefix: String,
}

impl ArchiveFolder {
    /// View `path` inside `parent`. A trailing `/` on `path` is dropped.
    pub fn new(parent: ArchivePackage, path: &str) -> Self {
        let prefix = path.strip_suffix('/').unwrap_or(path).to_string();
        Self { parent, prefix }
    }

    fn full_path(&self, path: &str) -> String {
        format!("{}/{}", self.prefix, path)
    }
}

#[async_trait]
impl Package for ArchiveFolder {
    fn name(&self) -> &str {
        &self.prefix
    }

    async fn contents(&self) -> VfsResult<Vec<String>> {
        Ok(self
            .parent
            .entry_names()
            .filter_map(|entry| entry.strip_prefix(self.prefix.as_str())?.strip_prefix('/'))
            .filter(|rest| rest.split('/').filter(|s| !s.is_empty()).count() == 1)
            .map(str::to_string)
            .collect())
    }

    async fn get_stream(&self, path: &str) -> VfsResult<Option<Bytes>> {
        self.parent.get_stream(&self.full_path(path)).await
    }

    async fn contains(&self, path: &str) -> bool {
        self.parent.contains(&self.full_path(path)).await
    }

    async fn open_package(
        &self,
        path: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>> {
        self.parent.open_package(&self.full_path(path), context).await
    }
}

/// Built-in loader for zip-format containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveLoader;

impl ArchiveLoader {
    /// Filename extensions this loader claims.
    pub const EXTENSIONS: &'static [&'static str] = &[".zip", ".oramap"];

    /// Returns true if `filename` carries an archive extension.
    pub fn recognizes(filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        Self::EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

#[async_trait]
impl PackageLoader for ArchiveLoader {
    async fn try_parse_package(
        &self,
        data: Bytes,
        filename: &str,
        _context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>> {
        if !Self::recognizes(filename) {
            return Ok(None);
        }
        Ok(Some(Arc::new(ArchivePackage::create(Some(data), filename)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use crate::package::PackageLoaders;
    use crate::test_support::{zip_bytes, zip_bytes_with_dirs};

    fn archive() -> ArchivePackage {
        let data = zip_bytes_with_dirs(
            &["maps/", "maps/desert/"],
            &[
                ("rules.yaml", b"rules"),
                ("maps/a.map", b"map a"),
                ("maps/desert/b.map", b"map b"),
            ],
        );
        ArchivePackage::create(Some(data), "core.zip").unwrap()
    }

    #[tokio::test]
    async fn test_get_stream_and_contains() {
        let archive = archive();
        assert_eq!(archive.name(), "core.zip");
        assert!(archive.contains("maps/a.map").await);
        assert!(!archive.contains("maps/").await);
        assert!(!archive.contains("missing").await);

        let data = archive.get_stream("maps/a.map").await.unwrap().unwrap();
        assert_eq!(&data[..], b"map a");
        assert!(archive.get_stream("maps/").await.unwrap().is_none());
        assert!(archive.get_stream("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contents_lists_every_entry() {
        let contents = archive().contents().await.unwrap();
        assert_eq!(
            contents,
            vec!["maps/", "maps/a.map", "maps/desert/", "maps/desert/b.map", "rules.yaml"]
        );
    }

    #[tokio::test]
    async fn test_empty_archive() {
        let archive = ArchivePackage::create(None, "new.zip").unwrap();
        assert!(archive.is_empty());
        assert!(archive.contents().await.unwrap().is_empty());
        assert!(archive.get_stream("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_archive() {
        let result = ArchivePackage::create(Some(Bytes::from_static(b"not a zip")), "bad.zip");
        assert!(matches!(result, Err(VfsError::Archive(_))));
    }

    #[tokio::test]
    async fn test_implied_directories() {
        let data = zip_bytes(&[("maps/desert/b.map", b"b")]);
        let archive = ArchivePackage::create(Some(data), "implied.zip").unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.entry_sizes("maps/desert/b.map").map(|(size, _)| size), Some(1));
        assert_eq!(archive.entry_sizes("maps/"), None);

        let loaders = PackageLoaders::default();
        let folder = archive.open_package("maps", &loaders).await.unwrap().unwrap();
        assert_eq!(folder.contents().await.unwrap(), vec!["desert/"]);
    }

    #[tokio::test]
    async fn test_folder_view() {
        let archive = archive();
        let loaders = PackageLoaders::default();

        let folder = archive.open_package("maps/", &loaders).await.unwrap().unwrap();
        assert_eq!(folder.name(), "maps");
        assert_eq!(folder.contents().await.unwrap(), vec!["a.map", "desert/"]);
        assert!(folder.contains("a.map").await);
        assert!(!folder.contains("rules.yaml").await);
        assert_eq!(&folder.get_stream("desert/b.map").await.unwrap().unwrap()[..], b"map b");

        let nested = folder.open_package("desert", &loaders).await.unwrap().unwrap();
        assert_eq!(nested.name(), "maps/desert");
        assert_eq!(nested.contents().await.unwrap(), vec!["b.map"]);
    }

    #[tokio::test]
    async fn test_nested_archive() {
        let inner = zip_bytes(&[("inner.txt", b"inside")]);
        let outer = ArchivePackage::create(
            Some(zip_bytes(&[("inner.zip", &inner[..]), ("outer.txt", b"outside")])),
            "outer.zip",
        )
        .unwrap();
        let loaders = PackageLoaders::default();

        let nested = outer.open_package("inner.zip", &loaders).await.unwrap().unwrap();
        assert_eq!(nested.name(), "inner.zip");
        assert!(nested.contains("inner.txt").await);
        assert!(!nested.contains("outer.txt").await);
        assert!(!nested.contains("inner.zip").await);
    }

    #[tokio::test]
    async fn test_open_unrecognized_entry() {
        let archive = archive();
        let loaders = PackageLoaders::default();
        assert!(archive.open_package("rules.yaml", &loaders).await.unwrap().is_none());
        assert!(archive.open_package("missing", &loaders).await.unwrap().is_none());
    }

    #[test]
    fn test_capacity_hint_is_capped() {
        assert_eq!(capacity_hint(12), 12);
        assert_eq!(capacity_hint(u64::MAX), MAX_CAPACITY_HINT);
    }

    #[tokio::test]
    async fn test_entry_larger_than_hint() {
        let big = vec![7u8; MAX_CAPACITY_HINT * 2 + 3];
        let archive =
            ArchivePackage::create(Some(zip_bytes(&[("big.bin", &big[..])])), "big.zip").unwrap();
        let data = archive.get_stream("big.bin").await.unwrap().unwrap();
        assert_eq!(data.len(), big.len());
        assert_eq!(&data[..], &big[..]);
    }

    #[test]
    fn test_extension_allow_list() {
        assert!(ArchiveLoader::recognizes("bits/conquer.zip"));
        assert!(ArchiveLoader::recognizes("maps/Desert.ORAMAP"));
        assert!(!ArchiveLoader::recognizes("rules.yaml"));
    }
}
