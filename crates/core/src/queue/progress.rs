//! Aggregate progress over a batch.

use serde::Serialize;

use crate::converter::Converter;
use crate::task::{Task, TaskQueue};

/// Progress of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateProgress {
    /// Mean over all tasks: finished ones count 1, waiting ones 0.
    pub fraction: f64,
    /// Whether any task is still waiting or running.
    pub active: bool,
    /// Running inputs and their own progress.
    pub running: Vec<(String, f64)>,
}

/// Computes the aggregate progress of a converter queue.
///
/// A running task contributes position over duration, or zero while its
/// duration is unknown. Task progress never regresses, so neither does the
/// aggregate of a fixed task set.
pub fn aggregate(queue: &TaskQueue<Converter>) -> AggregateProgress {
    let running: Vec<(String, f64)> = queue
        .running()
        .map(|slot| {
            let task = slot.task();
            (task.item().uri().to_string(), task.progress().fraction)
        })
        .collect();

    let total = queue.len();
    let done = queue.finished_count() as f64;
    let sum = done + running.iter().map(|(_, f)| f).sum::<f64>();
    let fraction = if total == 0 {
        0.0
    } else {
        (sum / total as f64).clamp(0.0, 1.0)
    };

    AggregateProgress {
        fraction,
        active: queue.waiting_count() + queue.running_count() > 0,
        running,
    }
}
