//! Scoped subscription to an engine's event stream.

use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::engine::{EngineEvent, EventKind};
use crate::task::TaskContext;

/// An engine event tagged with the pipeline run it belongs to.
///
/// Restarting a pipeline starts a new run; events still in flight from the
/// previous one are dropped by their run number.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineEvent {
    pub run: u32,
    pub event: EngineEvent,
}

/// Forwards subscribed engine events into a task's queue channel.
///
/// Dropping the connection unsubscribes: the forwarder is aborted and no
/// further events of this run reach the queue.
#[derive(Debug)]
pub struct Connection {
    forwarder: JoinHandle<()>,
}

impl Connection {
    pub fn open(
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        kinds: BTreeSet<EventKind>,
        run: u32,
        ctx: TaskContext<PipelineEvent>,
    ) -> Self {
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !kinds.contains(&event.kind()) {
                    trace!(task = %ctx.id(), kind = ?event.kind(), "Unsubscribed event dropped");
                    continue;
                }
                if !ctx.forward(PipelineEvent { run, event }) {
                    break;
                }
            }
        });
        Self { forwarder }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
