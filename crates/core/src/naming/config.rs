//! Configuration for the naming module.

use serde::{Deserialize, Serialize};

/// Naming settings, cloned once per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Write output next to the input (below its base path).
    #[serde(default = "default_true")]
    pub same_folder_as_input: bool,

    /// Output folder used when not writing next to the input.
    #[serde(default)]
    pub selected_folder: Option<String>,

    /// Fill `subfolder_pattern` to build the folders below the output root.
    #[serde(default)]
    pub create_subfolders: bool,

    #[serde(default = "default_subfolder_pattern")]
    pub subfolder_pattern: String,

    /// Pattern of the file name without extension. May contain `/`.
    #[serde(default = "default_basename_pattern")]
    pub basename_pattern: String,

    /// Transliterate the new part of target paths to a portable subset.
    #[serde(default)]
    pub replace_messy_chars: bool,

    /// Upper bound of the numbered-suffix loop on name collisions.
    #[serde(default = "default_max_collision_retries")]
    pub max_collision_retries: u32,
}

fn default_true() -> bool {
    true
}

fn default_subfolder_pattern() -> String {
    "%(album-artist)s/%(album)s".to_string()
}

fn default_basename_pattern() -> String {
    "%(.inputname)s".to_string()
}

fn default_max_collision_retries() -> u32 {
    100
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            same_folder_as_input: default_true(),
            selected_folder: None,
            create_subfolders: false,
            subfolder_pattern: default_subfolder_pattern(),
            basename_pattern: default_basename_pattern(),
            replace_messy_chars: false,
            max_collision_retries: default_max_collision_retries(),
        }
    }
}
