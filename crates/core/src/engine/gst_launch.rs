//! Engine implementation driving the `gst-launch-1.0` command line tool.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::parser::{OutputParser, ParsedLine};
use super::traits::{EngineHandle, MediaEngine};
use super::types::{EngineEvent, LaunchedPipeline};

/// Elements every conversion pipeline needs.
const REQUIRED_ELEMENTS: &[&str] = &[
    "filesrc",
    "decodebin",
    "audioconvert",
    "audioresample",
    "audiorate",
    "progressreport",
    "filesink",
];

/// Engine backed by `gst-launch-1.0` subprocesses.
pub struct GstLaunchEngine {
    config: EngineConfig,
}

impl GstLaunchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[async_trait]
impl MediaEngine for GstLaunchEngine {
    fn name(&self) -> &str {
        "gst-launch"
    }

    fn launch(&self, description: &str) -> Result<LaunchedPipeline, EngineError> {
        let tokens = tokenize_description(description)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        debug!(description = %description, "Materialized pipeline");
        Ok(LaunchedPipeline {
            handle: Box::new(GstLaunchHandle::new(
                self.config.gst_launch_path.clone(),
                tokens,
                events_tx,
            )),
            events: events_rx,
        })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        let output = Command::new(&self.config.gst_launch_path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match output {
            Ok(status) if status.success() => {}
            Ok(status) => {
                return Err(EngineError::launch_failed(format!(
                    "{} --version exited with {}",
                    self.config.gst_launch_path.display(),
                    status
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::BinaryNotFound {
                    path: self.config.gst_launch_path.clone(),
                })
            }
            Err(e) => return Err(EngineError::Io(e)),
        }

        for element in REQUIRED_ELEMENTS {
            if !self.has_element(element).await {
                return Err(EngineError::ElementMissing {
                    element: element.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn has_element(&self, element: &str) -> bool {
        Command::new(&self.config.gst_inspect_path)
            .args(["--exists", element])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Timing values reported by the progress stage.
#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    position: Option<f64>,
    duration: Option<f64>,
}

/// Requests the handle sends to the task owning the child process.
#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Kill,
}

/// One gst-launch subprocess.
///
/// The process is spawned by the first `play`. The child itself is owned by
/// its supervisor task, which applies pause, resume and kill requests and
/// reaps it; the handle never signals a process id that may have been
/// reaped already.
struct GstLaunchHandle {
    program: PathBuf,
    tokens: Vec<String>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
    timing_tx: Option<watch::Sender<Timing>>,
    timing: watch::Receiver<Timing>,
    control: Option<mpsc::UnboundedSender<Control>>,
    paused: bool,
}

impl GstLaunchHandle {
    fn new(program: PathBuf, tokens: Vec<String>, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        let (timing_tx, timing) = watch::channel(Timing::default());
        Self {
            program,
            tokens,
            events: Some(events),
            timing_tx: Some(timing_tx),
            timing,
            control: None,
            paused: false,
        }
    }

    fn spawn(&mut self) -> Result<(), EngineError> {
        let timing_tx = self
            .timing_tx
            .take()
            .ok_or_else(|| EngineError::control_failed("pipeline already stopped"))?;

        let mut child = Command::new(&self.program)
            .args(["-m", "-t", "-v"])
            .args(&self.tokens)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::BinaryNotFound {
                        path: self.program.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;
        let streams = child_streams(&mut child)?;
        let events = self
            .events
            .take()
            .ok_or_else(|| EngineError::control_failed("pipeline already stopped"))?;

        debug!(pid = ?child.id(), "Spawned gst-launch");
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        self.control = Some(control_tx);
        tokio::spawn(supervise(streams, child, control_rx, events, timing_tx));
        Ok(())
    }

    fn send(&self, control: Control) -> Result<(), EngineError> {
        self.control
            .as_ref()
            .ok_or_else(|| EngineError::control_failed("process not started"))?
            .send(control)
            .map_err(|_| EngineError::control_failed("process not running"))
    }
}

impl EngineHandle for GstLaunchHandle {
    fn play(&mut self) -> Result<(), EngineError> {
        if self.control.is_none() {
            return self.spawn();
        }
        if self.paused {
            self.send(Control::Resume)?;
            self.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        if self.control.is_none() || self.paused {
            return Ok(());
        }
        self.send(Control::Pause)?;
        self.paused = true;
        Ok(())
    }

    fn query_duration(&self) -> Option<f64> {
        self.timing.borrow().duration
    }

    fn query_position(&self) -> Option<f64> {
        self.timing.borrow().position
    }

    fn stop(&mut self) {
        if let Some(control) = self.control.take() {
            // fails only once the supervisor reaped the child
            let _ = control.send(Control::Kill);
        }
        self.events = None;
        self.timing_tx = None;
        self.paused = false;
    }
}

impl Drop for GstLaunchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

type Streams = (
    tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    tokio::io::Lines<BufReader<tokio::process::ChildStderr>>,
);

fn child_streams(child: &mut Child) -> Result<Streams, EngineError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::launch_failed("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| EngineError::launch_failed("stderr not captured"))?;
    Ok((BufReader::new(stdout).lines(), BufReader::new(stderr).lines()))
}

/// Owns the child until it is reaped: reads both output streams, translating
/// lines into events, and applies control requests.
///
/// A dropped control channel counts as a kill request. Nothing is reported
/// for a killed process.
async fn supervise(
    (mut stdout, mut stderr): Streams,
    mut child: Child,
    mut control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::UnboundedSender<EngineEvent>,
    timing: watch::Sender<Timing>,
) {
    let mut out_parser = OutputParser::new();
    let mut err_parser = OutputParser::new();
    let mut out_open = true;
    let mut err_open = true;
    let mut control_open = true;
    let mut killed = false;
    let mut saw_error = false;
    let mut saw_eos = false;

    let emit = |parsed: Vec<ParsedLine>, saw_error: &mut bool, saw_eos: &mut bool| {
        for line in parsed {
            match line {
                ParsedLine::Event(event) => {
                    match event {
                        EngineEvent::Error(_) => *saw_error = true,
                        EngineEvent::EndOfStream => *saw_eos = true,
                        _ => {}
                    }
                    let _ = events.send(event);
                }
                ParsedLine::Progress { position, duration } => {
                    timing.send_modify(|t| {
                        t.position = Some(position);
                        if duration.is_some() {
                            t.duration = duration;
                        }
                    });
                }
            }
        }
    };

    let status = loop {
        tokio::select! {
            line = stdout.next_line(), if out_open => match line {
                Ok(Some(line)) if !killed => emit(out_parser.feed(&line), &mut saw_error, &mut saw_eos),
                Ok(Some(_)) => {}
                _ => {
                    out_open = false;
                    if !killed {
                        let tail = out_parser.finish().map(ParsedLine::Event).into_iter().collect();
                        emit(tail, &mut saw_error, &mut saw_eos);
                    }
                }
            },
            line = stderr.next_line(), if err_open => match line {
                Ok(Some(line)) if !killed => emit(err_parser.feed(&line), &mut saw_error, &mut saw_eos),
                Ok(Some(_)) => {}
                _ => err_open = false,
            },
            request = control.recv(), if control_open => match request {
                Some(Control::Pause) => signal_child(&child, true),
                Some(Control::Resume) => signal_child(&child, false),
                Some(Control::Kill) | None => {
                    control_open = false;
                    killed = true;
                    if let Err(e) = child.start_kill() {
                        debug!(error = %e, "Kill failed, process already exited");
                    }
                }
            },
            status = child.wait(), if !out_open && !err_open => break status,
        }
    };

    if killed {
        debug!("gst-launch killed");
        return;
    }
    match status {
        Ok(status) if status.success() => {
            if !saw_eos && !saw_error {
                emit(vec![ParsedLine::Event(EngineEvent::EndOfStream)], &mut saw_error, &mut saw_eos);
            }
        }
        Ok(status) => {
            if !saw_error {
                emit(
                    vec![ParsedLine::Event(EngineEvent::Error(format!(
                        "gst-launch exited with {}",
                        status
                    )))],
                    &mut saw_error,
                    &mut saw_eos,
                );
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to wait for gst-launch");
            if !saw_error {
                let _ = events.send(EngineEvent::Error(e.to_string()));
            }
        }
    }
    info!(saw_eos, saw_error, "gst-launch exited");
}

/// Stops or continues the child. Only called by its supervisor before the
/// child is reaped, so the id cannot belong to another process.
#[cfg(unix)]
fn signal_child(child: &Child, stop: bool) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let signal = if stop { Signal::SIGSTOP } else { Signal::SIGCONT };
    if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
        warn!(pid, signal = %signal, error = %e, "Cannot signal gst-launch");
    }
}

#[cfg(not(unix))]
fn signal_child(_child: &Child, stop: bool) {
    if stop {
        warn!("Pausing gst-launch is not supported on this platform");
    }
}

/// Splits a pipeline description into gst-launch arguments.
///
/// Whitespace separates arguments except inside double quotes. Quotes are
/// removed and `\"` / `\\` inside quotes are unescaped, so a quoted
/// property value containing spaces arrives as one argument.
pub fn tokenize_description(description: &str) -> Result<Vec<String>, EngineError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = description.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            '\\' if quoted => match chars.next() {
                Some(next) => current.push(next),
                None => return Err(EngineError::launch_failed("dangling escape in description")),
            },
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err(EngineError::launch_failed("unterminated quote in description"));
    }
    if in_token {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(EngineError::launch_failed("empty pipeline description"));
    }
    Ok(tokens)
}
