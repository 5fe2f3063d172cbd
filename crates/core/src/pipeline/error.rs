//! Error types for the pipeline module.

use thiserror::Error;

use crate::engine::EngineError;
use crate::fs::FsError;
use crate::task::TaskState;

/// Errors raised by a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline could not be built or launched. Nothing was written.
    #[error("Failed to construct pipeline: {reason}")]
    Construction { reason: String },

    /// The engine reported an error while running.
    #[error("{message}")]
    Runtime { message: String },

    /// The operation is not valid in the current state.
    #[error("Cannot {operation} a pipeline in state {state:?}")]
    InvalidState {
        state: TaskState,
        operation: &'static str,
    },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),
}

impl PipelineError {
    pub fn construction(reason: impl Into<String>) -> Self {
        Self::Construction {
            reason: reason.into(),
        }
    }
}
