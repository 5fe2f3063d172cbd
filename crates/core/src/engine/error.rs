//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while launching or controlling an engine instance.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found.
    #[error("Engine binary not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// The pipeline description could not be launched.
    #[error("Failed to launch pipeline: {reason}")]
    LaunchFailed { reason: String },

    /// A required element is not installed.
    #[error("Required element not available: {element}")]
    ElementMissing { element: String },

    /// A control request (play, pause, stop) failed.
    #[error("Engine control failed: {reason}")]
    ControlFailed { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn launch_failed(reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            reason: reason.into(),
        }
    }

    pub fn control_failed(reason: impl Into<String>) -> Self {
        Self::ControlFailed {
            reason: reason.into(),
        }
    }
}
