//! Trait definition for the filesystem interface.

use std::path::Path;

use super::error::FsError;

/// The filesystem primitives the core relies on.
///
/// None of these are transactional. Callers re-check `exists` right before
/// acting when another task may be racing for the same name.
pub trait FileSystem: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Renames `from` to `to`.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Removes the file at `path`.
    fn unlink(&self, path: &Path) -> Result<(), FsError>;

    /// Creates `path` and any missing parents.
    fn make_directory(&self, path: &Path) -> Result<(), FsError>;

    /// Copies permission bits from `from` onto `to`.
    fn copy_permissions(&self, from: &Path, to: &Path) -> Result<(), FsError>;
}
