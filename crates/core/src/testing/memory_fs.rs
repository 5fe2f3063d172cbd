//! In-memory filesystem for testing.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::fs::{FileSystem, FsError};

#[derive(Debug, Default)]
struct Namespace {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
    failing_renames: Vec<PathBuf>,
    renames: Vec<(PathBuf, PathBuf)>,
}

/// Mock implementation of the FileSystem trait.
///
/// Tracks files and directories as sets of paths. Renames into a path
/// registered with [`MemoryFs::fail_renames_into`] fail with a permission
/// error.
#[derive(Debug, Default)]
pub struct MemoryFs {
    ns: Mutex<Namespace>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a file (and its parent directories).
    pub fn touch(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut ns = self.lock();
        if let Some(parent) = path.parent() {
            add_dirs(&mut ns, parent);
        }
        ns.files.insert(path.to_path_buf());
    }

    /// Makes renames whose target lies below `prefix` fail.
    pub fn fail_renames_into(&self, prefix: impl Into<PathBuf>) {
        self.lock().failing_renames.push(prefix.into());
    }

    /// All files, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock().files.iter().cloned().collect()
    }

    /// Successful renames, in order.
    pub fn renames(&self) -> Vec<(PathBuf, PathBuf)> {
        self.lock().renames.clone()
    }

    pub fn is_file(&self, path: impl AsRef<Path>) -> bool {
        self.lock().files.contains(path.as_ref())
    }

    fn lock(&self) -> MutexGuard<'_, Namespace> {
        self.ns.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn add_dirs(ns: &mut Namespace, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        ns.dirs.insert(ancestor.to_path_buf());
    }
}

impl FileSystem for MemoryFs {
    fn name(&self) -> &str {
        "memory"
    }

    fn exists(&self, path: &Path) -> bool {
        let ns = self.lock();
        ns.files.contains(path) || ns.dirs.contains(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let mut ns = self.lock();
        if ns.failing_renames.iter().any(|p| to.starts_with(p)) {
            return Err(FsError::RenameFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only target"),
            });
        }
        if !ns.files.remove(from) {
            return Err(FsError::RenameFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "source missing"),
            });
        }
        match to.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !ns.dirs.contains(parent) => {
                ns.files.insert(from.to_path_buf());
                Err(FsError::RenameFailed {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::NotFound, "target directory missing"),
                })
            }
            _ => {
                ns.files.insert(to.to_path_buf());
                ns.renames.push((from.to_path_buf(), to.to_path_buf()));
                Ok(())
            }
        }
    }

    fn unlink(&self, path: &Path) -> Result<(), FsError> {
        if self.lock().files.remove(path) {
            Ok(())
        } else {
            Err(FsError::NotFound {
                path: path.to_path_buf(),
            })
        }
    }

    fn make_directory(&self, path: &Path) -> Result<(), FsError> {
        let mut ns = self.lock();
        if ns.files.contains(path) {
            return Err(FsError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "file in the way"),
            });
        }
        add_dirs(&mut ns, path);
        Ok(())
    }

    fn copy_permissions(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let ns = self.lock();
        for path in [from, to] {
            if !ns.files.contains(path) {
                return Err(FsError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}
