//! [`Task`] implementation for pipelines.

use std::sync::Arc;
use tracing::{debug, error, trace};

use super::connection::PipelineEvent;
use super::error::PipelineError;
use super::pipeline::Pipeline;
use super::stage::Stage;
use crate::engine::{EngineEvent, EngineState, EventKind, MediaEngine};
use crate::media::MediaItem;
use crate::task::{Completion, Progress, Task, TaskContext, TaskError, TaskState};

/// What the pipeline does with an engine or construction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// The task ends errored with the error.
    Escalate,
    /// The error is kept aside and the task ends done.
    Ignore,
}

/// Specialization point of a [`PipelineTask`].
pub trait PipelineHandler: Send + 'static {
    /// Event kinds needed on top of error, end-of-stream and tags.
    fn subscriptions(&self) -> &'static [EventKind] {
        &[]
    }

    fn name(&self, pipeline: &Pipeline) -> String {
        pipeline.item().file_name()
    }

    /// Builds the stage list right before the first launch. An error here
    /// is a construction error.
    fn stages(&mut self, pipeline: &mut Pipeline) -> Result<Vec<Stage>, PipelineError>;

    fn on_error(&mut self, _pipeline: &mut Pipeline, _error: &PipelineError) -> ErrorDisposition {
        ErrorDisposition::Escalate
    }

    /// New whitelisted tags were merged into the item.
    fn on_tags(&mut self, _pipeline: &mut Pipeline) {}

    fn on_pad_created(&mut self, _pipeline: &mut Pipeline) {}

    fn on_state_changed(&mut self, _pipeline: &mut Pipeline, _state: EngineState) {}

    fn on_type_found(&mut self, _pipeline: &mut Pipeline, _mime: &str) {}

    /// Called once after the pipeline ended done or errored, after the
    /// engine was released.
    fn finished(&mut self, _pipeline: &mut Pipeline, _error: Option<&TaskError>) {}

    /// Called once after the pipeline was cancelled.
    fn aborted(&mut self, _pipeline: &mut Pipeline) {}

    /// Called by `restart` after the engine was stopped, before replaying.
    fn before_restart(&mut self, _pipeline: &mut Pipeline) {}
}

/// A pipeline run as a queue task.
pub struct PipelineTask<H> {
    pipeline: Pipeline,
    handler: H,
    ctx: Option<TaskContext<PipelineEvent>>,
    completion: Option<Completion<PipelineEvent>>,
    error: Option<TaskError>,
    ignored_error: Option<String>,
    finalized: bool,
}

impl<H: PipelineHandler> PipelineTask<H> {
    pub fn new(item: MediaItem, engine: Arc<dyn MediaEngine>, handler: H) -> Self {
        let mut pipeline = Pipeline::new(item, engine);
        pipeline.subscribe(handler.subscriptions());
        Self {
            pipeline,
            handler,
            ctx: None,
            completion: None,
            error: None,
            ignored_error: None,
            finalized: false,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn item(&self) -> &MediaItem {
        self.pipeline.item()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// An error the handler chose to ignore.
    pub fn ignored_error(&self) -> Option<&str> {
        self.ignored_error.as_deref()
    }

    /// Whether the done or aborted path already ran.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Stops the engine, lets the handler remove partial output and plays
    /// the stages again under a new run number.
    pub fn restart(&mut self) -> Result<(), TaskError> {
        if self.finalized {
            return Err(TaskError::from_source(PipelineError::InvalidState {
                state: self.pipeline.state(),
                operation: "restart",
            }));
        }
        debug!(item = %self.pipeline.item().uri(), "Restarting pipeline");
        self.pipeline.reset();
        self.handler.before_restart(&mut self.pipeline);
        self.error = None;
        self.ignored_error = None;
        self.start()
    }

    fn start(&mut self) -> Result<(), TaskError> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| TaskError::failed("pipeline started without a task context"))?;
        let first_launch = !self.pipeline.is_live();
        let handler = &mut self.handler;

        match self.pipeline.play(|p| handler.stages(p), &ctx) {
            Ok(()) => Ok(()),
            Err(e @ PipelineError::InvalidState { .. }) => Err(TaskError::from_source(e)),
            Err(e) if first_launch => {
                let e = match e {
                    PipelineError::Construction { .. } => e,
                    other => PipelineError::construction(other.to_string()),
                };
                error!(task = %ctx.id(), item = %self.pipeline.item().uri(), error = %e, "Pipeline construction failed");
                self.pipeline.eos = true;
                self.fail_with(e);
                self.settle();
                Ok(())
            }
            Err(e) => Err(TaskError::from_source(e)),
        }
    }

    /// Records an engine-side error according to the handler's disposition.
    fn fail_with(&mut self, error: PipelineError) {
        match self.handler.on_error(&mut self.pipeline, &error) {
            ErrorDisposition::Escalate => {
                self.pipeline.terminate(TaskState::Errored);
                self.error = Some(TaskError::from_source(error));
            }
            ErrorDisposition::Ignore => {
                debug!(item = %self.pipeline.item().uri(), error = %error, "Ignoring pipeline error");
                self.pipeline.terminate(TaskState::Done);
                self.ignored_error = Some(error.to_string());
            }
        }
    }

    /// Runs the handler's done or aborted path once the pipeline reached a
    /// terminal state, then fires the completion.
    fn settle(&mut self) {
        if self.finalized || !self.pipeline.state().is_terminal() {
            return;
        }
        self.finalized = true;
        if self.pipeline.state() == TaskState::Aborted {
            self.handler.aborted(&mut self.pipeline);
        } else {
            self.handler.finished(&mut self.pipeline, self.error.as_ref());
        }
        if let Some(completion) = self.completion.take() {
            completion.fire();
        }
    }
}

impl<H: PipelineHandler> Task for PipelineTask<H> {
    type Event = PipelineEvent;

    fn name(&self) -> String {
        self.handler.name(&self.pipeline)
    }

    fn state(&self) -> TaskState {
        self.pipeline.state()
    }

    fn set_callback(&mut self, completion: Completion<PipelineEvent>) {
        self.completion = Some(completion);
    }

    fn run(&mut self, ctx: &TaskContext<PipelineEvent>) -> Result<(), TaskError> {
        self.ctx = Some(ctx.clone());
        self.start()
    }

    fn on_event(&mut self, event: PipelineEvent) -> Result<(), TaskError> {
        if event.run != self.pipeline.run || self.pipeline.state().is_terminal() {
            trace!(run = event.run, event = ?event.event, "Dropping stale pipeline event");
            return Ok(());
        }

        match event.event {
            EngineEvent::Error(message) => {
                error!(item = %self.pipeline.item().uri(), error = %message, "Pipeline error");
                self.pipeline.eos = true;
                self.fail_with(PipelineError::Runtime { message });
            }
            EngineEvent::EndOfStream => {
                self.pipeline.eos = true;
                self.pipeline.query_duration();
                self.pipeline.terminate(TaskState::Done);
            }
            EngineEvent::Tags(raw) => {
                if self.pipeline.item_mut().tags.merge_raw(raw) > 0 {
                    self.handler.on_tags(&mut self.pipeline);
                }
            }
            EngineEvent::PadCreated => {
                self.pipeline.processing = true;
                self.pipeline.query_duration();
                self.handler.on_pad_created(&mut self.pipeline);
            }
            EngineEvent::StateChanged(state) => {
                self.handler.on_state_changed(&mut self.pipeline, state);
            }
            EngineEvent::TypeFound(mime) => {
                self.handler.on_type_found(&mut self.pipeline, &mime);
            }
        }

        self.settle();
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), TaskError> {
        self.completion = None;
        if self.finalized {
            return Ok(());
        }
        self.pipeline.terminate(TaskState::Aborted);
        self.finalized = true;
        self.handler.aborted(&mut self.pipeline);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TaskError> {
        self.pipeline.pause().map_err(TaskError::from_source)
    }

    fn resume(&mut self) -> Result<(), TaskError> {
        self.pipeline.resume().map_err(TaskError::from_source)
    }

    fn progress(&self) -> Progress {
        self.pipeline.progress()
    }

    fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    fn fail(&mut self, error: TaskError) {
        self.completion = None;
        if self.finalized {
            if self.error.is_none() {
                self.error = Some(error);
            }
            return;
        }
        self.pipeline.terminate(TaskState::Errored);
        self.error = Some(error);
        self.finalized = true;
        self.handler.finished(&mut self.pipeline, self.error.as_ref());
    }
}

impl<H> std::fmt::Debug for PipelineTask<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineTask")
            .field("pipeline", &self.pipeline)
            .field("error", &self.error)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskId, TaskMessage};
    use crate::testing::{MockEngine, Script};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        extra: &'static [EventKind],
        disposition: Option<ErrorDisposition>,
        fail_stages: bool,
        calls: Vec<String>,
    }

    impl PipelineHandler for Recorder {
        fn subscriptions(&self) -> &'static [EventKind] {
            self.extra
        }

        fn stages(&mut self, pipeline: &mut Pipeline) -> Result<Vec<Stage>, PipelineError> {
            if self.fail_stages {
                return Err(PipelineError::construction("output directory not writable"));
            }
            Ok(vec![
                Stage::source(pipeline.item().uri()),
                Stage::element("decodebin"),
                Stage::element("fakesink"),
            ])
        }

        fn on_error(&mut self, _pipeline: &mut Pipeline, error: &PipelineError) -> ErrorDisposition {
            self.calls.push(format!("error:{}", error));
            self.disposition.unwrap_or(ErrorDisposition::Escalate)
        }

        fn on_pad_created(&mut self, _pipeline: &mut Pipeline) {
            self.calls.push("pad".into());
        }

        fn finished(&mut self, _pipeline: &mut Pipeline, error: Option<&TaskError>) {
            self.calls.push(format!("finished:{}", error.is_some()));
        }

        fn aborted(&mut self, _pipeline: &mut Pipeline) {
            self.calls.push("aborted".into());
        }

        fn before_restart(&mut self, _pipeline: &mut Pipeline) {
            self.calls.push("restart".into());
        }
    }

    type Rx = mpsc::UnboundedReceiver<TaskMessage<PipelineEvent>>;

    fn start(engine: &MockEngine, recorder: Recorder) -> (PipelineTask<Recorder>, Rx) {
        let mut task = PipelineTask::new(MediaItem::new("/in/a.flac"), Arc::new(engine.clone()), recorder);
        let (ctx, rx) = TaskContext::channel(TaskId::new(1));
        task.set_callback(ctx.completion());
        task.run(&ctx).unwrap();
        (task, rx)
    }

    /// Feeds events to the task until it completes; returns how often the
    /// completion fired.
    async fn drive(task: &mut PipelineTask<Recorder>, rx: &mut Rx) -> usize {
        let mut completions = 0;
        while let Ok(Some(message)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await
        {
            match message {
                TaskMessage::Event { event, .. } => task.on_event(event).unwrap(),
                TaskMessage::Completed { .. } => completions += 1,
                TaskMessage::Control(_) => {}
            }
        }
        completions
    }

    #[tokio::test]
    async fn test_end_of_stream_completes_once() {
        let engine = MockEngine::new().with_default(Script::success(30.0));
        let (mut task, mut rx) = start(&engine, Recorder::default());
        assert_eq!(task.state(), TaskState::Running);

        assert_eq!(drive(&mut task, &mut rx).await, 1);
        assert_eq!(task.state(), TaskState::Done);
        assert!(task.pipeline().eos);
        assert!(!task.pipeline().is_live());
        assert_eq!(task.item().duration, Some(30.0));
        assert_eq!(task.progress().fraction, 1.0);
        // pad-created was not subscribed
        assert_eq!(task.handler().calls, vec!["finished:false"]);
        assert_eq!(engine.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribed_pad_created_reaches_handler() {
        let engine = MockEngine::new().with_default(Script::success(30.0));
        let recorder = Recorder {
            extra: &[EventKind::PadCreated],
            ..Default::default()
        };
        let (mut task, mut rx) = start(&engine, recorder);
        drive(&mut task, &mut rx).await;
        assert_eq!(task.handler().calls, vec!["pad", "finished:false"]);
        assert!(task.pipeline().processing);
    }

    #[tokio::test]
    async fn test_runtime_error_escalates() {
        let engine = MockEngine::new().with_default(Script::runtime_error("decoder failed"));
        let (mut task, mut rx) = start(&engine, Recorder::default());

        assert_eq!(drive(&mut task, &mut rx).await, 1);
        assert_eq!(task.state(), TaskState::Errored);
        assert!(task.pipeline().eos);
        assert_eq!(task.error().map(|e| e.to_string()), Some("decoder failed".into()));
        assert_eq!(
            task.handler().calls,
            vec!["error:decoder failed", "finished:true"]
        );
    }

    #[tokio::test]
    async fn test_ignored_error_ends_done() {
        let engine = MockEngine::new().with_default(Script::runtime_error("no tags"));
        let recorder = Recorder {
            disposition: Some(ErrorDisposition::Ignore),
            ..Default::default()
        };
        let (mut task, mut rx) = start(&engine, recorder);
        drive(&mut task, &mut rx).await;
        assert_eq!(task.state(), TaskState::Done);
        assert!(task.error().is_none());
        assert_eq!(task.ignored_error(), Some("no tags"));
    }

    #[tokio::test]
    async fn test_construction_error_completes_without_playing() {
        let engine = MockEngine::new();
        let recorder = Recorder {
            fail_stages: true,
            ..Default::default()
        };
        let (mut task, mut rx) = start(&engine, recorder);

        assert_eq!(task.state(), TaskState::Errored);
        assert!(task.pipeline().eos);
        assert_eq!(drive(&mut task, &mut rx).await, 1);
        assert_eq!(engine.play_count(), 0);
        assert!(engine.launched().is_empty());
    }

    #[tokio::test]
    async fn test_launch_failure_is_a_construction_error() {
        let engine = MockEngine::new().with_default(Script {
            launch_error: Some("no element \"nosuchenc\"".into()),
            ..Default::default()
        });
        let (task, _rx) = start(&engine, Recorder::default());
        assert_eq!(task.state(), TaskState::Errored);
        assert!(task
            .error()
            .map(|e| e.to_string().contains("construct"))
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn test_tags_are_whitelisted() {
        let engine = MockEngine::new().with_default(Script::success(1.0).with_events(vec![
            EngineEvent::Tags(vec![
                ("artist".into(), "Foo Bar".into()),
                ("encoder".into(), "lame".into()),
            ]),
            EngineEvent::EndOfStream,
        ]));
        let (mut task, mut rx) = start(&engine, Recorder::default());
        drive(&mut task, &mut rx).await;
        assert!(task.item().tags.contains("artist"));
        assert!(!task.item().tags.contains("encoder"));
    }

    #[tokio::test]
    async fn test_cancel_does_not_complete() {
        let engine = MockEngine::new().with_default(Script::held(Some(10.0)));
        let (mut task, mut rx) = start(&engine, Recorder::default());

        task.cancel().unwrap();
        task.cancel().unwrap();
        assert_eq!(task.state(), TaskState::Aborted);
        assert_eq!(task.handler().calls, vec!["aborted"]);
        assert_eq!(drive(&mut task, &mut rx).await, 0);
        assert_eq!(engine.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_drops_stale_events() {
        let engine = MockEngine::new().with_default(Script::held(Some(10.0)));
        let (mut task, mut rx) = start(&engine, Recorder::default());

        let stale = PipelineEvent {
            run: 0,
            event: EngineEvent::EndOfStream,
        };
        task.restart().unwrap();
        task.on_event(stale).unwrap();
        assert_eq!(task.state(), TaskState::Running);
        assert_eq!(engine.launched().len(), 2);

        engine.emit("a.flac", EngineEvent::EndOfStream);
        assert_eq!(drive(&mut task, &mut rx).await, 1);
        assert_eq!(task.handler().calls, vec!["restart", "finished:false"]);
    }

    #[tokio::test]
    async fn test_pause_and_progress() {
        let engine = MockEngine::new().with_default(Script::held(Some(10.0)));
        let (mut task, _rx) = start(&engine, Recorder::default());

        engine.set_position("a.flac", 5.0);
        assert_eq!(task.progress().fraction, 0.5);
        task.pause().unwrap();
        assert_eq!(task.state(), TaskState::Paused);
        engine.set_position("a.flac", 2.0);
        assert_eq!(task.progress().fraction, 0.5);
        task.resume().unwrap();
        assert_eq!(task.state(), TaskState::Running);
        task.cancel().unwrap();
    }
}
