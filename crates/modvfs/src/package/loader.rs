//! Package loader registry.
//!
//! Loaders are format sniffers: each one looks at raw bytes plus a filename
//! and either parses a package or declines. Caller loaders run first and the
//! built-in [`ArchiveLoader`] runs last, so callers can claim extensions the
//! archive loader would otherwise take.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::VfsResult;
use crate::package::{ArchiveLoader, PackageHandle};

/// Turns raw bytes into a package, or declines.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    /// Parse `data` (named `filename`) as a package.
    ///
    /// Returns `Ok(None)` for "not my format". Errors mean the loader claimed
    /// the data but could not parse it.
    async fn try_parse_package(
        &self,
        data: Bytes,
        filename: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>>;
}

/// What a package needs from its surroundings to open nested packages.
#[async_trait]
pub trait PackageContext: Send + Sync {
    /// Run `data` through the registered loaders.
    async fn try_parse_package(&self, data: Bytes, filename: &str)
    -> VfsResult<Option<PackageHandle>>;
}

/// Ordered list of loaders: caller loaders, then the archive loader.
pub struct PackageLoaders {
    custom: Vec<Arc<dyn PackageLoader>>,
    archive: ArchiveLoader,
}

impl std::fmt::Debug for PackageLoaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageLoaders")
            .field("custom", &self.custom.len())
            .finish()
    }
}

impl Default for PackageLoaders {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PackageLoaders {
    /// Create a registry trying `custom` loaders in order, then archives.
    pub fn new(custom: Vec<Arc<dyn PackageLoader>>) -> Self {
        Self {
            custom,
            archive: ArchiveLoader,
        }
    }

    /// Append a caller loader. It still runs before the archive loader.
    pub fn push(&mut self, loader: Arc<dyn PackageLoader>) {
        self.custom.push(loader);
    }

    /// Try every loader in order, handing each one `context` for nested opens.
    pub async fn parse(
        &self,
        data: Bytes,
        filename: &str,
        context: &dyn PackageContext,
    ) -> VfsResult<Option<PackageHandle>> {
        for loader in &self.custom {
            if let Some(package) = loader
                .try_parse_package(data.clone(), filename, context)
                .await?
            {
                return Ok(Some(package));
            }
        }
        self.archive.try_parse_package(data, filename, context).await
    }
}

#[async_trait]
impl PackageContext for PackageLoaders {
    async fn try_parse_package(
        &self,
        data: Bytes,
        filename: &str,
    ) -> VfsResult<Option<PackageHandle>> {
        self.parse(data, filename, self).await
    }
}
