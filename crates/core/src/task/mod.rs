//! Background tasks and the bounded-concurrency scheduler that runs them.
//!
//! A [`Task`] is a unit of cancellable, pausable, progress-reporting work
//! whose `run` returns immediately. Tasks talk back to their [`TaskQueue`]
//! only through a one-way channel: engine events are forwarded with a
//! [`TaskContext`], completion is signalled by firing the one-shot
//! [`Completion`] registered with `set_callback`.
//!
//! Every call the scheduler makes into a task goes through [`contain`], so
//! an error or panic escaping a task still completes that task exactly once
//! and never stalls its siblings.

mod error;
mod queue;
mod traits;
mod types;

pub use error::{contain, TaskError, TaskFault};
pub use queue::{QueueHandle, QueueHooks, QueueState, RunOutcome, RunSummary, Slot, TaskQueue};
pub use traits::Task;
pub use types::{Completion, Progress, QueueCommand, TaskContext, TaskId, TaskMessage, TaskState};
