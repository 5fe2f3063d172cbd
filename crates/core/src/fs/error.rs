//! Error types for the filesystem interface.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`super::FileSystem`] operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path does not exist.
    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to rename a file.
    #[error("Failed to rename {from} to {to}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a file.
    #[error("Failed to delete {path}")]
    UnlinkFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Maps an I/O error for `path`, keeping not-found and permission
    /// errors distinguishable.
    pub fn from_io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path: path.into() },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path.into() },
            _ => Self::Io(error),
        }
    }

    /// Whether the error means the path simply was not there.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::UnlinkFailed { source, .. } | Self::RenameFailed { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
