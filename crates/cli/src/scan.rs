//! Input discovery.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use sonata_core::MediaItem;

/// Collects the files below each path as media items.
///
/// Files found in a directory keep that directory as base path, so their
/// relative subfolders can be mirrored in the output. A file given
/// directly has its own folder as base.
pub fn scan(paths: &[PathBuf], recursive: bool) -> Vec<MediaItem> {
    let mut items = Vec::new();
    for path in paths {
        if path.is_file() {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            items.push(item(path, base));
        } else if path.is_dir() {
            let walker = if recursive {
                WalkDir::new(path)
            } else {
                WalkDir::new(path).max_depth(1)
            };
            let mut found: Vec<PathBuf> = walker
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            for file in found {
                debug!("Discovered: {}", file.display());
                items.push(item(&file, path));
            }
        } else {
            warn!("Skipping {}: no such file or directory", path.display());
        }
    }
    info!("Discovered {} files", items.len());
    items
}

fn item(path: &Path, base: &Path) -> MediaItem {
    MediaItem::with_base_path(
        path.to_string_lossy().into_owned(),
        base.to_string_lossy().into_owned(),
    )
}
