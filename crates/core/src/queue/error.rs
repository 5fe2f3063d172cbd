//! Error types for the converter queue.

use std::path::PathBuf;
use thiserror::Error;

use crate::fs::FsError;
use crate::naming::NamingError;

/// Errors that can occur while preparing or running a batch.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A temp or target name could not be generated.
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    /// A filesystem operation failed.
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    /// The configured output format cannot be produced by the engine.
    #[error("Output format not available: {format}")]
    FormatUnavailable { format: String },

    /// Every numbered variant of a target name is taken.
    #[error("No free name for {path} after {attempts} attempts")]
    NoFreeName { path: PathBuf, attempts: u32 },

    /// The batch reached its end with tasks still running.
    #[error("{count} task(s) still running at batch end")]
    TasksStillRunning { count: usize },

    /// The batch was aborted before it finished.
    #[error("Batch aborted")]
    Aborted,
}
