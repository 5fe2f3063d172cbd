//! Configuration for the converter queue.

use serde::{Deserialize, Serialize};

/// Scheduling knobs of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Conversions running at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Milliseconds between aggregate progress updates.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_max_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_progress_interval_ms() -> u64 {
    100
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}
