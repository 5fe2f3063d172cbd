//! Temp and target path generation for one batch.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::config::NamingConfig;
use super::error::NamingError;
use super::escape::{escape_child, escape_path};
use super::pattern::{build_tokens, fill_pattern, Tokens};
use crate::fs::FileSystem;
use crate::media::MediaItem;
use crate::uri;

const TEMP_NAME_ATTEMPTS: usize = 1000;

/// Generates names from a snapshot of the naming settings.
///
/// One generator serves a whole batch; settings changed afterwards do not
/// affect it.
#[derive(Clone)]
pub struct TargetNameGenerator {
    config: NamingConfig,
    suffix: String,
    fs: Arc<dyn FileSystem>,
}

impl TargetNameGenerator {
    /// Creates a generator for outputs with the given extension.
    pub fn new(
        config: NamingConfig,
        suffix: impl Into<String>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, NamingError> {
        for pattern in [&config.basename_pattern, &config.subfolder_pattern] {
            if uri::is_uri(pattern) {
                return Err(NamingError::PatternIsUri {
                    pattern: pattern.clone(),
                });
            }
        }
        if !config.same_folder_as_input
            && config
                .selected_folder
                .as_deref()
                .map_or(true, |f| f.trim().is_empty())
        {
            return Err(NamingError::SelectedFolderMissing);
        }

        Ok(Self {
            config,
            suffix: suffix.into().trim_start_matches('.').to_string(),
            fs,
        })
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Extension of generated targets, without dot.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Token dictionary for an item, with the current time as timestamp.
    pub fn tokens(&self, item: &MediaItem) -> Tokens {
        build_tokens(item, &self.suffix, &Local::now())
    }

    /// Final output path for an item.
    ///
    /// The result may exist already; collisions are resolved when the
    /// output is moved into place.
    pub fn generate_target_path(&self, item: &MediaItem) -> Result<PathBuf, NamingError> {
        let tokens = self.tokens(item);
        let parent = local_string(self.output_root(item));
        let filename = format!(
            "{}.{}",
            fill_pattern(&self.config.basename_pattern, &tokens)?,
            self.suffix
        );
        let child = match self.subfolder(item, &tokens)? {
            Some(subfolder) => uri::join(&subfolder, &filename),
            None => filename,
        };

        let path = if self.config.replace_messy_chars {
            escape_child(&quote_segments(&child), &parent, |p| self.exists(p))?
        } else {
            uri::join(&parent, &child)
        };
        debug!(item = %item.uri(), target = %path, "Generated target path");
        Ok(PathBuf::from(path))
    }

    /// A free private path for the output of an item while it converts:
    /// `<folder>/<input name>~XXXXXX~SC~`.
    pub fn generate_temp_path(&self, item: &MediaItem) -> Result<PathBuf, NamingError> {
        let folder = if self.config.same_folder_as_input {
            local_string(uri::parent(item.uri()))
        } else {
            local_string(self.output_root(item))
        };
        let basename = item.file_name();

        for _ in 0..TEMP_NAME_ATTEMPTS {
            let random = Uuid::new_v4().simple().to_string();
            let mut path = uri::join(&folder, &format!("{}~{}~SC~", basename, &random[..6]));
            if self.config.replace_messy_chars {
                path = escape_path(&path, |p| self.exists(p));
            }
            if !self.exists(&path) {
                return Ok(PathBuf::from(path));
            }
        }
        Err(NamingError::TempPathExhausted { folder })
    }

    fn output_root<'a>(&'a self, item: &'a MediaItem) -> &'a str {
        match &self.config.selected_folder {
            Some(folder) if !self.config.same_folder_as_input => folder,
            _ => item.base_path(),
        }
    }

    /// Folders between the output root and the file, if any.
    fn subfolder(&self, item: &MediaItem, tokens: &Tokens) -> Result<Option<String>, NamingError> {
        if self.config.create_subfolders {
            return fill_pattern(&self.config.subfolder_pattern, tokens).map(Some);
        }
        // mirror the input tree unless the basename builds its own folders
        if !self.config.basename_pattern.contains('/') {
            return Ok(item.subfolders().map(str::to_string));
        }
        Ok(None)
    }

    fn exists(&self, path: &str) -> bool {
        self.fs.exists(Path::new(path))
    }
}

impl std::fmt::Debug for TargetNameGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetNameGenerator")
            .field("config", &self.config)
            .field("suffix", &self.suffix)
            .field("fs", &self.fs.name())
            .finish()
    }
}

/// Local path of a plain path or `file://` URI, as a string.
fn local_string(input: &str) -> String {
    uri::to_local_path(input).to_string_lossy().into_owned()
}

/// Percent-encodes every segment so escaping can decode them again without
/// touching literal `%` signs from tags.
fn quote_segments(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
