//! Mock media engine for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::memory_fs::MemoryFs;
use crate::engine::{EngineError, EngineEvent, EngineHandle, LaunchedPipeline, MediaEngine};

/// Scripted behavior for pipelines whose description contains a pattern.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Events emitted on the first `play`, in order.
    pub events: Vec<EngineEvent>,
    /// Answer to duration queries once playing.
    pub duration: Option<f64>,
    /// Answer to position queries once playing.
    pub position: Option<f64>,
    /// If set, `launch` fails with this reason.
    pub launch_error: Option<String>,
    /// Write the sink file on play (only when the script ends in EOS).
    pub write_output: bool,
}

impl Script {
    /// A pipeline that plays and reaches end-of-stream.
    pub fn success(duration: f64) -> Self {
        Self {
            events: vec![EngineEvent::PadCreated, EngineEvent::EndOfStream],
            duration: Some(duration),
            position: Some(duration),
            write_output: true,
            ..Default::default()
        }
    }

    /// A pipeline that fails at runtime.
    pub fn runtime_error(message: &str) -> Self {
        Self {
            events: vec![EngineEvent::Error(message.to_string())],
            ..Default::default()
        }
    }

    /// A pipeline that plays but emits nothing until told to.
    pub fn held(duration: Option<f64>) -> Self {
        Self {
            duration,
            position: Some(0.0),
            ..Default::default()
        }
    }

    pub fn with_events(mut self, events: Vec<EngineEvent>) -> Self {
        self.events = events;
        self
    }
}

/// Where scripted pipelines write their sink output.
#[derive(Debug, Clone, Default)]
enum OutputTarget {
    #[default]
    None,
    Disk,
    Memory(Arc<MemoryFs>),
}

/// A pipeline the mock has launched.
#[derive(Debug)]
struct Live {
    description: String,
    events: mpsc::UnboundedSender<EngineEvent>,
    timing: Arc<Mutex<Timing>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Timing {
    duration: Option<f64>,
    position: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
    scripts: Vec<(String, Script)>,
    default_script: Script,
    elements: Option<HashSet<String>>,
    output: OutputTarget,
    launched: Vec<String>,
    live: Vec<Live>,
    plays: usize,
    stops: usize,
}

/// Mock implementation of the MediaEngine trait.
///
/// Provides controllable behavior for testing:
/// - Scripted events per pipeline description
/// - Launch failures
/// - Duration and position answers
/// - Recording of launched descriptions
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockEngine::new().with_default(Script::success(120.0));
/// engine.script("broken.flac", Script::runtime_error("decoder failed"));
///
/// // ... run a batch ...
///
/// assert_eq!(engine.launched().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<Inner>>,
}

impl MockEngine {
    /// Create a mock whose pipelines emit nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script used when no pattern matches.
    pub fn with_default(self, script: Script) -> Self {
        self.lock().default_script = script;
        self
    }

    /// Restrict the elements reported as available.
    pub fn with_elements(self, elements: &[&str]) -> Self {
        self.lock().elements = Some(elements.iter().map(|e| e.to_string()).collect());
        self
    }

    /// Create sink files on disk.
    pub fn writing_to_disk(self) -> Self {
        self.lock().output = OutputTarget::Disk;
        self
    }

    /// Create sink files in an in-memory filesystem.
    pub fn writing_to(self, fs: Arc<MemoryFs>) -> Self {
        self.lock().output = OutputTarget::Memory(fs);
        self
    }

    /// Use `script` for descriptions containing `pattern`.
    pub fn script(&self, pattern: &str, script: Script) {
        self.lock().scripts.push((pattern.to_string(), script));
    }

    /// Descriptions launched so far.
    pub fn launched(&self) -> Vec<String> {
        self.lock().launched.clone()
    }

    pub fn play_count(&self) -> usize {
        self.lock().plays
    }

    pub fn stop_count(&self) -> usize {
        self.lock().stops
    }

    /// Sends an event to every live pipeline whose description contains
    /// `pattern`. Returns how many received it.
    pub fn emit(&self, pattern: &str, event: EngineEvent) -> usize {
        let inner = self.lock();
        inner
            .live
            .iter()
            .filter(|l| l.description.contains(pattern))
            .filter(|l| l.events.send(event.clone()).is_ok())
            .count()
    }

    /// Updates the position answer of matching live pipelines.
    pub fn set_position(&self, pattern: &str, position: f64) {
        let inner = self.lock();
        for live in inner.live.iter().filter(|l| l.description.contains(pattern)) {
            if let Ok(mut timing) = live.timing.lock() {
                timing.position = Some(position);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a panicking test thread must not hide the mock from the others
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn script_for(inner: &Inner, description: &str) -> Script {
        inner
            .scripts
            .iter()
            .rev()
            .find(|(pattern, _)| description.contains(pattern.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| inner.default_script.clone())
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn launch(&self, description: &str) -> Result<LaunchedPipeline, EngineError> {
        let mut inner = self.lock();
        inner.launched.push(description.to_string());
        let script = Self::script_for(&inner, description);
        if let Some(reason) = &script.launch_error {
            return Err(EngineError::launch_failed(reason.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let timing = Arc::new(Mutex::new(Timing::default()));
        inner.live.push(Live {
            description: description.to_string(),
            events: tx.clone(),
            timing: timing.clone(),
        });

        Ok(LaunchedPipeline {
            handle: Box::new(MockHandle {
                engine: self.clone(),
                description: description.to_string(),
                output: inner.output.clone(),
                script,
                events: tx,
                timing,
                started: false,
                stopped: false,
            }),
            events: rx,
        })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn has_element(&self, element: &str) -> bool {
        match &self.lock().elements {
            Some(elements) => elements.contains(element),
            None => true,
        }
    }
}

struct MockHandle {
    engine: MockEngine,
    description: String,
    output: OutputTarget,
    script: Script,
    events: mpsc::UnboundedSender<EngineEvent>,
    timing: Arc<Mutex<Timing>>,
    started: bool,
    stopped: bool,
}

impl MockHandle {
    fn write_output(&self) {
        let ends_in_eos = matches!(self.script.events.last(), Some(EngineEvent::EndOfStream));
        if !self.script.write_output || !ends_in_eos {
            return;
        }
        let Some(path) = sink_location(&self.description) else {
            return;
        };
        match &self.output {
            OutputTarget::None => {}
            OutputTarget::Disk => {
                let _ = std::fs::write(&path, b"mock output");
            }
            OutputTarget::Memory(fs) => fs.touch(&path),
        }
    }
}

impl EngineHandle for MockHandle {
    fn play(&mut self) -> Result<(), EngineError> {
        if self.stopped {
            return Err(EngineError::control_failed("pipeline stopped"));
        }
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.engine.lock().plays += 1;
        if let Ok(mut timing) = self.timing.lock() {
            timing.duration = self.script.duration;
            timing.position = self.script.position;
        }
        self.write_output();
        for event in &self.script.events {
            let _ = self.events.send(event.clone());
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn query_duration(&self) -> Option<f64> {
        self.timing.lock().ok().and_then(|t| t.duration)
    }

    fn query_position(&self) -> Option<f64> {
        self.timing.lock().ok().and_then(|t| t.position)
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let mut inner = self.engine.lock();
        inner.stops += 1;
        let description = &self.description;
        inner.live.retain(|l| &l.description != description);
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Extracts the `filesink location="..."` path from a description.
fn sink_location(description: &str) -> Option<PathBuf> {
    let rest = &description[description.rfind("filesink location=\"")? + 19..];
    let mut path = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => path.push(chars.next()?),
            '"' => return Some(PathBuf::from(path)),
            c => path.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_location() {
        assert_eq!(
            sink_location(r#"filesrc location="/a" ! filesink location="/out/x \"y\".ogg""#),
            Some(PathBuf::from("/out/x \"y\".ogg"))
        );
        assert_eq!(sink_location("fakesrc ! fakesink"), None);
    }

    #[tokio::test]
    async fn test_scripted_events_on_play() {
        let engine = MockEngine::new().with_default(Script::success(10.0));
        let mut launched = engine.launch("fakesrc ! fakesink").unwrap();
        assert_eq!(launched.handle.query_duration(), None);

        launched.handle.play().unwrap();
        assert_eq!(launched.handle.query_duration(), Some(10.0));
        assert_eq!(launched.events.recv().await, Some(EngineEvent::PadCreated));
        assert_eq!(launched.events.recv().await, Some(EngineEvent::EndOfStream));
        assert_eq!(engine.play_count(), 1);

        launched.handle.stop();
        launched.handle.stop();
        assert_eq!(engine.stop_count(), 1);
    }

    #[test]
    fn test_launch_failure_is_recorded() {
        let engine = MockEngine::new();
        engine.script(
            "bad",
            Script {
                launch_error: Some("no element".into()),
                ..Default::default()
            },
        );
        assert!(engine.launch("bad ! fakesink").is_err());
        assert_eq!(engine.launched(), vec!["bad ! fakesink".to_string()]);
    }

    #[tokio::test]
    async fn test_emit_reaches_live_pipelines() {
        let engine = MockEngine::new().with_default(Script::held(Some(4.0)));
        let mut launched = engine.launch("a.flac").unwrap();
        launched.handle.play().unwrap();

        assert_eq!(engine.emit("a.flac", EngineEvent::EndOfStream), 1);
        assert_eq!(launched.events.recv().await, Some(EngineEvent::EndOfStream));

        engine.set_position("a.flac", 2.0);
        assert_eq!(launched.handle.query_position(), Some(2.0));
    }
}
