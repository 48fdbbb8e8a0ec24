//! Fixtures shared by unit tests.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use zip::write::SimpleFileOptions;

use crate::error::VfsResult;
use crate::package::{Package, PackageContext, PackageHandle};

/// Build a zip archive holding `files`.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Bytes {
    zip_bytes_with_dirs(&[], files)
}

/// Build a zip archive with explicit directory entries ahead of `files`.
pub fn zip_bytes_with_dirs(dirs: &[&str], files: &[(&str, &[u8])]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for dir in dirs {
        writer.add_directory(*dir, options).unwrap();
    }
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

/// Flat in-memory package whose contents can change after mounting.
pub struct StaticPackage {
    name: String,
    files: RwLock<BTreeMap<String, Bytes>>,
}

impl StaticPackage {
    pub fn new(name: &str, files: &[(&str, &[u8])]) -> Self {
        let files = files
            .iter()
            .map(|(path, data)| (path.to_string(), Bytes::copy_from_slice(data)))
            .collect();
        Self {
            name: name.to_string(),
            files: RwLock::new(files),
        }
    }

    pub fn insert(&self, path: &str, data: &[u8]) {
        self.files
            .write()
            .insert(path.to_string(), Bytes::copy_from_slice(data));
    }

    pub fn remove(&self, path: &str) {
        self.files.write().remove(path);
    }
}

#[async_trait]
impl Package for StaticPackage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn contents(&self) -> VfsResult<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    async fn get_stream(&self, path: &str) -> VfsResult<Option<Bytes>> {
        Ok(self.files.read().get(path).cloned())
    }

    async fn contains(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    async fn open_package(
        &self,
        path: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>> {
        let data = self.files.read().get(path).cloned();
        match data {
            Some(data) => context.try_parse_package(data, path).await,
            None => Ok(None),
        }
    }
}
