//! Types shared by tasks and the task queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Identifier of a task within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Paused,
    Done,
    Errored,
    Aborted,
}

impl TaskState {
    /// Done, errored and aborted are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored | Self::Aborted)
    }

    /// Running or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// Progress of a single task.
///
/// `weight` lets heterogeneous tasks be aggregated proportionally, e.g. by
/// the length of the audio they process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub fraction: f64,
    pub weight: f64,
}

impl Progress {
    pub fn new(fraction: f64, weight: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            weight: weight.max(0.0),
        }
    }

    pub fn unknown() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Commands a [`super::QueueHandle`] can send to a running queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCommand {
    Pause,
    Resume,
    Abort,
}

/// Messages processed by the queue's control loop.
#[derive(Debug)]
pub enum TaskMessage<E> {
    /// An event for a task, forwarded from its engine.
    Event { task: TaskId, event: E },
    /// A task fired its completion.
    Completed { task: TaskId },
    /// A control command.
    Control(QueueCommand),
}

/// Per-task handle onto the queue channel.
pub struct TaskContext<E> {
    id: TaskId,
    tx: mpsc::UnboundedSender<TaskMessage<E>>,
}

impl<E> Clone for TaskContext<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<E> TaskContext<E> {
    pub fn new(id: TaskId, tx: mpsc::UnboundedSender<TaskMessage<E>>) -> Self {
        Self { id, tx }
    }

    /// Creates a context with its own channel, for driving a task outside
    /// of a queue.
    pub fn channel(id: TaskId) -> (Self, mpsc::UnboundedReceiver<TaskMessage<E>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Forwards an event to the control loop. Returns false once the queue
    /// is gone.
    pub fn forward(&self, event: E) -> bool {
        self.tx
            .send(TaskMessage::Event {
                task: self.id,
                event,
            })
            .is_ok()
    }

    /// Creates the completion continuation for this task.
    pub fn completion(&self) -> Completion<E> {
        Completion::new(self.id, self.tx.clone())
    }
}

/// One-shot completion continuation.
///
/// Firing consumes it, so a task cannot complete twice through the same
/// handle.
pub struct Completion<E> {
    task: TaskId,
    tx: mpsc::UnboundedSender<TaskMessage<E>>,
}

impl<E> Completion<E> {
    pub fn new(task: TaskId, tx: mpsc::UnboundedSender<TaskMessage<E>>) -> Self {
        Self { task, tx }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn fire(self) {
        // the queue may already be gone after an abort
        let _ = self.tx.send(TaskMessage::Completed { task: self.task });
    }
}

impl<E> fmt::Debug for Completion<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("task", &self.task).finish()
    }
}
