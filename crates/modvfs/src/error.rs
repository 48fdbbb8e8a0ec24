//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// `open` could not resolve a logical path in any mounted package.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A mount target could not be opened, or no loader recognized its format.
    #[error("could not open package '{0}', file not found or its format is not supported")]
    PackageOpen(String),

    /// A `$id` mount target named a mod that is not installed.
    #[error("could not load mod '{id}'. Available mods: {}", .available.join(", "))]
    ModNotFound {
        /// The requested mod id.
        id: String,
        /// Every installed mod id, sorted.
        available: Vec<String>,
    },

    /// Every registered loader declined the data.
    #[error("unsupported package format: {0}")]
    UnsupportedFormat(String),

    /// The backing store has no entry at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path escapes the root of a store or directory package.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Malformed archive container.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    /// Create a PackageOpen error.
    pub fn package_open(name: impl Into<String>) -> Self {
        Self::PackageOpen(name.into())
    }

    /// Create a ModNotFound error.
    pub fn mod_not_found<I, S>(id: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ModNotFound {
            id: id.into(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Returns true for errors that mean "nothing at this path".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileNotFound(_) | Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::FileNotFound(msg) | VfsError::NotFound(msg) => {
                io::Error::new(io::ErrorKind::NotFound, msg)
            }
            VfsError::PathEscapesRoot(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::Archive(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_not_found_lists_available() {
        let err = VfsError::mod_not_found("ts", ["cnc", "ra"]);
        assert_eq!(
            err.to_string(),
            "could not load mod 'ts'. Available mods: cnc, ra"
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(VfsError::file_not_found("a").is_not_found());
        assert!(VfsError::not_found("a").is_not_found());
        assert!(VfsError::Io(io::Error::from(io::ErrorKind::NotFound)).is_not_found());
        assert!(!VfsError::package_open("a").is_not_found());
    }

    #[test]
    fn test_io_conversion() {
        let io_err: io::Error = VfsError::path_escapes_root("../x").into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);

        let io_err: io::Error = VfsError::file_not_found("rules.yaml").into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let io_err: io::Error = VfsError::Archive(zip::result::ZipError::FileNotFound).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let io_err: io::Error = VfsError::UnsupportedFormat("readme.txt".into()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
        assert!(io_err.to_string().contains("readme.txt"));
    }
}
