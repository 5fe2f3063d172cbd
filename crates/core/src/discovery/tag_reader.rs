//! Tag reading pass.

use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{EngineState, EventKind, MediaEngine};
use crate::media::MediaItem;
use crate::pipeline::{ErrorDisposition, Pipeline, PipelineError, PipelineHandler, PipelineTask, Stage};
use crate::task::TaskError;

pub type TagReaderTask = PipelineTask<TagReader>;

/// Decodes just far enough for the engine to report the tags.
///
/// The engine emits tags while prerolling, so the pass ends as soon as the
/// pipeline reaches PLAYING.
#[derive(Debug, Default)]
pub struct TagReader {
    found_tags: bool,
}

impl TagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(item: MediaItem, engine: Arc<dyn MediaEngine>) -> TagReaderTask {
        PipelineTask::new(item, engine, Self::new())
    }

    /// Whether any whitelisted tag was found.
    pub fn found_tags(&self) -> bool {
        self.found_tags
    }
}

impl PipelineHandler for TagReader {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::StateChanged]
    }

    fn stages(&mut self, pipeline: &mut Pipeline) -> Result<Vec<Stage>, PipelineError> {
        Ok(super::decode_only(pipeline))
    }

    fn on_error(&mut self, pipeline: &mut Pipeline, error: &PipelineError) -> ErrorDisposition {
        info!(item = %pipeline.item().uri(), "ignored-error: {}", error);
        ErrorDisposition::Ignore
    }

    fn on_tags(&mut self, pipeline: &mut Pipeline) {
        debug!(item = %pipeline.item().uri(), tags = pipeline.item().tags.len(), "Found tags");
        self.found_tags = true;
    }

    fn on_state_changed(&mut self, pipeline: &mut Pipeline, state: EngineState) {
        if state == EngineState::Playing {
            debug!(item = %pipeline.item().uri(), "Tag reading done");
            pipeline.done();
        }
    }

    fn finished(&mut self, pipeline: &mut Pipeline, _error: Option<&TaskError>) {
        pipeline.item_mut().tags_read = true;
    }
}
