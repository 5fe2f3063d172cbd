//! Configuration for the engine module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the gst-launch based engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the gst-launch binary.
    #[serde(default = "default_launch_path")]
    pub gst_launch_path: PathBuf,

    /// Path to the gst-inspect binary.
    #[serde(default = "default_inspect_path")]
    pub gst_inspect_path: PathBuf,

    /// Seconds between position reports of the progress stage.
    #[serde(default = "default_progress_update_freq")]
    pub progress_update_freq: u32,
}

fn default_launch_path() -> PathBuf {
    PathBuf::from("gst-launch-1.0")
}

fn default_inspect_path() -> PathBuf {
    PathBuf::from("gst-inspect-1.0")
}

fn default_progress_update_freq() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gst_launch_path: default_launch_path(),
            gst_inspect_path: default_inspect_path(),
            progress_update_freq: default_progress_update_freq(),
        }
    }
}
