//! A single input file and its discovered metadata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::tags::TagMap;
use crate::uri;

/// One input to be converted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    uri: String,
    base_path: String,
    subfolders: Option<String>,
    /// Whitelisted metadata, filled by tag events.
    pub tags: TagMap,
    /// Duration in seconds, filled lazily by duration queries.
    pub duration: Option<f64>,
    /// Mime type, filled by type detection.
    pub mime_type: Option<String>,
    /// Set once a tag-reading pass has completed.
    pub tags_read: bool,
    progress: f64,
}

impl MediaItem {
    /// Creates an item whose base path is its own directory.
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let base_path = uri::parent(&uri).to_string();
        Self::with_base_path(uri, base_path)
    }

    /// Creates an item that was found below `base_path`.
    ///
    /// Directories between `base_path` and the file are remembered as
    /// subfolders, so the output can mirror the input tree.
    pub fn with_base_path(uri: impl Into<String>, base_path: impl Into<String>) -> Self {
        let uri = uri.into();
        let base_path = base_path.into().trim_end_matches('/').to_string();
        let dir = uri::parent(&uri);
        let subfolders = dir
            .strip_prefix(base_path.as_str())
            .filter(|rest| rest.starts_with('/'))
            .map(|rest| rest.trim_matches('/'))
            .filter(|rest| !rest.is_empty())
            .map(|rest| uri::decode(rest).into_owned());

        Self {
            uri,
            base_path,
            subfolders,
            tags: TagMap::new(),
            duration: None,
            mime_type: None,
            tags_read: false,
            progress: 0.0,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn subfolders(&self) -> Option<&str> {
        self.subfolders.as_deref()
    }

    /// Local filesystem path of the input.
    pub fn local_path(&self) -> PathBuf {
        uri::to_local_path(&self.uri)
    }

    /// Decoded file name, e.g. `a b.flac`.
    pub fn file_name(&self) -> String {
        uri::decode(uri::file_name(&self.uri)).into_owned()
    }

    /// Decoded file name without extension and the extension with its dot.
    pub fn stem_and_extension(&self) -> (String, String) {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => (name[..idx].to_string(), name[idx..].to_string()),
            _ => (name, String::new()),
        }
    }

    /// Per-item progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Raises the progress; values lower than the current one are ignored.
    pub fn set_progress(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction > self.progress {
            self.progress = fraction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_own_directory() {
        let item = MediaItem::new("/music/in/a.flac");
        assert_eq!(item.base_path(), "/music/in");
        assert_eq!(item.subfolders(), None);
    }

    #[test]
    fn test_subfolders_relative_to_base() {
        let item = MediaItem::with_base_path("file:///music/in/Foo/Bar/a.flac", "file:///music/in/");
        assert_eq!(item.subfolders(), Some("Foo/Bar"));
        assert_eq!(item.local_path(), PathBuf::from("/music/in/Foo/Bar/a.flac"));
    }

    #[test]
    fn test_stem_and_extension() {
        let item = MediaItem::new("file:///x/My%20Song.flac");
        assert_eq!(
            item.stem_and_extension(),
            ("My Song".to_string(), ".flac".to_string())
        );
        let item = MediaItem::new("/x/.hidden");
        assert_eq!(item.stem_and_extension(), (".hidden".to_string(), String::new()));
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut item = MediaItem::new("/x/a.flac");
        item.set_progress(0.5);
        item.set_progress(0.2);
        assert_eq!(item.progress(), 0.5);
        item.set_progress(3.0);
        assert_eq!(item.progress(), 1.0);
    }
}
