//! Engine-facing state of one pipeline.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::connection::{Connection, PipelineEvent};
use super::error::PipelineError;
use super::stage::{describe, Stage};
use crate::engine::{EngineHandle, EventKind, MediaEngine};
use crate::media::MediaItem;
use crate::task::{Progress, TaskContext, TaskState};

/// The item, engine instance and subscription of one pipeline.
///
/// The engine handle and the connection exist only between the first
/// `play` and `cleanup`, which every terminal transition calls.
pub struct Pipeline {
    item: MediaItem,
    engine: Arc<dyn MediaEngine>,
    subscriptions: BTreeSet<EventKind>,
    handle: Option<Box<dyn EngineHandle>>,
    connection: Option<Connection>,
    description: Option<String>,
    pub(super) state: TaskState,
    pub(super) run: u32,
    /// The engine reported end-of-stream or an error.
    pub eos: bool,
    /// Decoding has started.
    pub processing: bool,
    duration: Option<f64>,
    last_position: Cell<f64>,
    peak: Cell<f64>,
}

impl Pipeline {
    pub fn new(item: MediaItem, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            item,
            engine,
            subscriptions: EventKind::ALWAYS.into_iter().collect(),
            handle: None,
            connection: None,
            description: None,
            state: TaskState::Pending,
            run: 0,
            eos: false,
            processing: false,
            duration: None,
            last_position: Cell::new(0.0),
            peak: Cell::new(0.0),
        }
    }

    pub fn item(&self) -> &MediaItem {
        &self.item
    }

    pub fn item_mut(&mut self) -> &mut MediaItem {
        &mut self.item
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The description handed to the engine, once launched.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Adds event kinds on top of error, end-of-stream and tags.
    pub fn subscribe(&mut self, kinds: &[EventKind]) {
        self.subscriptions.extend(kinds.iter().copied());
    }

    /// Launches the stages and subscribes to the engine on the first call,
    /// then starts or continues playback.
    pub(super) fn play(
        &mut self,
        stages: impl FnOnce(&mut Self) -> Result<Vec<Stage>, PipelineError>,
        ctx: &TaskContext<PipelineEvent>,
    ) -> Result<(), PipelineError> {
        if self.state.is_terminal() {
            return Err(PipelineError::InvalidState {
                state: self.state,
                operation: "play",
            });
        }

        if self.handle.is_none() {
            let stages = stages(self)?;
            let description = describe(&stages);
            debug!(task = %ctx.id(), description = %description, "Launching pipeline");
            let launched = self
                .engine
                .launch(&description)
                .map_err(|e| PipelineError::construction(e.to_string()))?;
            self.connection = Some(Connection::open(
                launched.events,
                self.subscriptions.clone(),
                self.run,
                ctx.clone(),
            ));
            self.handle = Some(launched.handle);
            self.description = Some(description);
        }

        if let Some(handle) = self.handle.as_mut() {
            handle.play()?;
        }
        self.state = TaskState::Running;
        Ok(())
    }

    pub(super) fn pause(&mut self) -> Result<(), PipelineError> {
        if self.state != TaskState::Running {
            return Ok(());
        }
        if let Some(handle) = self.handle.as_mut() {
            handle.pause()?;
        }
        self.state = TaskState::Paused;
        Ok(())
    }

    pub(super) fn resume(&mut self) -> Result<(), PipelineError> {
        if self.state != TaskState::Paused {
            return Ok(());
        }
        if let Some(handle) = self.handle.as_mut() {
            handle.play()?;
        }
        self.state = TaskState::Running;
        Ok(())
    }

    /// Unsubscribes and stops the engine. Safe to call any number of times,
    /// also on a pipeline that never played.
    pub fn cleanup(&mut self) {
        self.connection = None;
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
    }

    /// Ends the pipeline successfully without waiting for end-of-stream.
    ///
    /// For passes that have what they need before the input is fully
    /// decoded. No-op once terminal.
    pub fn done(&mut self) {
        if !self.state.is_terminal() {
            self.eos = true;
            self.terminate(TaskState::Done);
        }
    }

    /// Cleans up and enters a terminal state.
    pub(super) fn terminate(&mut self, state: TaskState) {
        self.cleanup();
        self.state = state;
    }

    /// Resets per-run state so the stages are launched again on next play.
    pub(super) fn reset(&mut self) {
        self.cleanup();
        self.run += 1;
        self.description = None;
        self.eos = false;
        self.processing = false;
        self.duration = None;
        self.item.duration = None;
        self.last_position.set(0.0);
        self.peak.set(0.0);
        self.state = TaskState::Pending;
    }

    /// Duration in seconds, asking the engine while unknown.
    ///
    /// A known duration is also stored on the item.
    pub fn query_duration(&mut self) -> Option<f64> {
        if self.duration.is_none() {
            match self.handle.as_ref().and_then(|h| h.query_duration()) {
                Some(duration) if duration > 0.0 => {
                    self.duration = Some(duration);
                    self.item.duration = Some(duration);
                }
                _ => debug!(item = %self.item.uri(), "Duration not known yet"),
            }
        }
        self.duration
    }

    /// Position in seconds; the last known value (or zero) when the engine
    /// cannot answer.
    pub fn query_position(&self) -> f64 {
        match self.handle.as_ref().and_then(|h| h.query_position()) {
            Some(position) if position >= 0.0 => {
                self.last_position.set(position);
                position
            }
            _ => self.last_position.get(),
        }
    }

    /// Progress of this pipeline, never lower than previously reported.
    ///
    /// Weighted by duration where known.
    pub fn progress(&self) -> Progress {
        let duration = self
            .duration
            .or_else(|| self.handle.as_ref().and_then(|h| h.query_duration()))
            .filter(|d| *d > 0.0);

        let fraction = match self.state {
            TaskState::Done | TaskState::Errored | TaskState::Aborted => 1.0,
            TaskState::Pending => 0.0,
            TaskState::Running | TaskState::Paused => match duration {
                Some(d) => (self.query_position() / d).clamp(0.0, 1.0),
                None => 0.0,
            },
        };
        let fraction = fraction.max(self.peak.get());
        self.peak.set(fraction);
        Progress::new(fraction, duration.unwrap_or(1.0))
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!(item = %self.item.uri(), "Pipeline dropped while live");
            self.cleanup();
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("item", &self.item.uri())
            .field("state", &self.state)
            .field("run", &self.run)
            .field("eos", &self.eos)
            .finish_non_exhaustive()
    }
}
