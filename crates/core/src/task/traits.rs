//! Trait definition for background tasks.

use super::error::TaskError;
use super::types::{Completion, Progress, TaskContext, TaskState};

/// A unit of cancellable, pausable background work.
///
/// All methods are called from the queue's control loop and must not block:
/// `run` starts the work and returns, and the task later reacts to its
/// events in `on_event`. When the work ends (successfully or not) the task
/// fires the completion passed to `set_callback`, exactly once. `cancel`
/// must synchronously release whatever the task holds and must not fire the
/// completion.
pub trait Task: Send + 'static {
    /// Events delivered to this task by its external worker.
    type Event: Send + 'static;

    /// Human readable name used in logs.
    fn name(&self) -> String;

    fn state(&self) -> TaskState;

    /// Registers the completion continuation.
    fn set_callback(&mut self, completion: Completion<Self::Event>);

    /// Starts the work.
    fn run(&mut self, ctx: &TaskContext<Self::Event>) -> Result<(), TaskError>;

    /// Handles an event forwarded through the task's context.
    fn on_event(&mut self, event: Self::Event) -> Result<(), TaskError>;

    fn cancel(&mut self) -> Result<(), TaskError>;

    fn pause(&mut self) -> Result<(), TaskError>;

    fn resume(&mut self) -> Result<(), TaskError>;

    /// Current progress and its weight.
    fn progress(&self) -> Progress;

    /// The error recorded by the task, if it failed.
    fn error(&self) -> Option<&TaskError>;

    /// Forces the task into the errored state after an error escaped it.
    ///
    /// Implementations release their resources here but do not fire the
    /// completion; the scheduler completes the task itself.
    fn fail(&mut self, error: TaskError);
}
