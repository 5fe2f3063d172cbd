//! Local filesystem implementation backed by `std::fs`.

use std::path::Path;

use super::error::FsError;
use super::traits::FileSystem;

/// The real, local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn name(&self) -> &str {
        "local"
    }

    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so dangling links still count as taken names
        std::fs::symlink_metadata(path).is_ok()
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        std::fs::rename(from, to).map_err(|source| FsError::RenameFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
    }

    fn unlink(&self, path: &Path) -> Result<(), FsError> {
        std::fs::remove_file(path).map_err(|source| FsError::UnlinkFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn make_directory(&self, path: &Path) -> Result<(), FsError> {
        std::fs::create_dir_all(path).map_err(|source| FsError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn copy_permissions(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let permissions = std::fs::metadata(from)
            .map_err(|e| FsError::from_io(from, e))?
            .permissions();
        std::fs::set_permissions(to, permissions).map_err(|e| FsError::from_io(to, e))
    }
}
