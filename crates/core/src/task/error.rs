//! Task error types and the fault boundary around task calls.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use super::types::TaskId;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Task panicked: {0}")]
    Panicked(String),

    /// A fault already contained by an inner boundary.
    #[error("{0}")]
    Contained(Box<TaskFault>),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a typed error, keeping it reachable through `source()`.
    pub fn from_source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

impl From<TaskFault> for TaskError {
    fn from(fault: TaskFault) -> Self {
        Self::Contained(Box::new(fault))
    }
}

/// An error that escaped a task, tagged with the task it belongs to.
#[derive(Debug, Error)]
#[error("{task}: {error}")]
pub struct TaskFault {
    pub task: TaskId,
    #[source]
    pub error: TaskError,
}

impl TaskFault {
    pub fn new(task: TaskId, error: TaskError) -> Self {
        Self { task, error }
    }
}

/// Runs `f` on behalf of `task`, turning returned errors and panics into a
/// [`TaskFault`].
///
/// A fault contained by a nested boundary keeps its original task: the
/// innermost attachment wins.
pub fn contain<R>(
    task: TaskId,
    f: impl FnOnce() -> Result<R, TaskError>,
) -> Result<R, TaskFault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(TaskError::Contained(fault))) => Err(*fault),
        Ok(Err(error)) => Err(TaskFault::new(task, error)),
        Err(payload) => Err(TaskFault::new(
            task,
            TaskError::Panicked(panic_message(payload)),
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
