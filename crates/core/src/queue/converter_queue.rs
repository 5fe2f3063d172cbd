//! Batch conversion on top of the task queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::QueueConfig;
use super::error::QueueError;
use super::progress::{aggregate, AggregateProgress};
use super::report::{status_line, BatchReport};
use crate::config::Config;
use crate::converter::{Conversion, ConversionSettings, Converter};
use crate::engine::{EncoderCapabilities, MediaEngine};
use crate::fs::FileSystem;
use crate::media::MediaItem;
use crate::metrics;
use crate::naming::{NamingConfig, TargetNameGenerator};
use crate::notify::{Notification, Notifier};
use crate::pipeline::PipelineEvent;
use crate::task::{QueueHandle, QueueHooks, RunOutcome, RunSummary, Task, TaskError, TaskId, TaskQueue};

/// Converts a batch of items, moving each output into place as soon as its
/// conversion finished.
///
/// Settings and naming are snapshotted at construction; later changes to
/// the configuration do not affect a batch in flight.
pub struct ConverterQueue {
    queue: TaskQueue<Converter>,
    batch: Batch,
}

/// Per-batch state and the queue hooks working on it.
struct Batch {
    generator: TargetNameGenerator,
    settings: Arc<ConversionSettings>,
    engine: Arc<dyn MediaEngine>,
    fs: Arc<dyn FileSystem>,
    capabilities: Arc<EncoderCapabilities>,
    notifier: Option<Notifier>,
    progress_update_freq: u32,
    progress_tx: watch::Sender<AggregateProgress>,
    converted: Vec<(String, PathBuf)>,
    errors: Vec<String>,
    error_count: usize,
    duration_processed: f64,
    declined_optional_step: bool,
    report: Option<BatchReport>,
    failure: Option<QueueError>,
}

impl ConverterQueue {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        fs: Arc<dyn FileSystem>,
        settings: ConversionSettings,
        naming: NamingConfig,
        config: &QueueConfig,
    ) -> Result<Self, QueueError> {
        let generator = TargetNameGenerator::new(naming, settings.extension(), fs.clone())?;
        let (progress_tx, _) = watch::channel(AggregateProgress::default());
        let queue = TaskQueue::new(config.max_concurrency)
            .with_tick_interval(Duration::from_millis(config.progress_interval_ms.max(1)));

        Ok(Self {
            queue,
            batch: Batch {
                generator,
                settings: Arc::new(settings),
                engine,
                fs,
                capabilities: Arc::new(EncoderCapabilities::all()),
                notifier: None,
                progress_update_freq: 1,
                progress_tx,
                converted: Vec::new(),
                errors: Vec::new(),
                error_count: 0,
                duration_processed: 0.0,
                declined_optional_step: false,
                report: None,
                failure: None,
            },
        })
    }

    /// Builds a queue from a loaded configuration.
    pub fn from_config(
        config: &Config,
        engine: Arc<dyn MediaEngine>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, QueueError> {
        Ok(Self::new(
            engine,
            fs,
            config.conversion.clone(),
            config.naming.clone(),
            &config.queue,
        )?
        .with_progress_update_freq(config.engine.progress_update_freq))
    }

    /// Uses detected capabilities, failing if they cannot produce the
    /// configured output format.
    pub fn with_capabilities(mut self, capabilities: EncoderCapabilities) -> Result<Self, QueueError> {
        let output = &self.batch.settings.output;
        if !output.is_available(&capabilities) {
            return Err(QueueError::FormatUnavailable {
                format: output.id().to_string(),
            });
        }
        self.batch.capabilities = Arc::new(capabilities);
        Ok(self)
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.batch.notifier = Some(notifier);
        self
    }

    /// Seconds between engine progress reports.
    pub fn with_progress_update_freq(mut self, seconds: u32) -> Self {
        self.batch.progress_update_freq = seconds;
        self
    }

    /// Queues a conversion of `item`.
    pub fn add(&mut self, item: MediaItem) -> Result<TaskId, QueueError> {
        let batch = &self.batch;
        let temp = batch.generator.generate_temp_path(&item)?;
        if batch.fs.exists(&temp) {
            // a leftover of an earlier run
            batch.fs.unlink(&temp)?;
        }

        let mut conversion = Conversion::new(&temp, batch.settings.clone(), batch.fs.clone())
            .with_capabilities(batch.capabilities.clone())
            .with_progress_update_freq(batch.progress_update_freq);
        if let Some(notifier) = &batch.notifier {
            conversion = conversion.with_notifier(notifier.clone());
        }

        debug!(item = %item.uri(), temp = %temp.display(), "Queueing conversion");
        metrics::CONVERSIONS_STARTED
            .with_label_values(&[batch.settings.output.id()])
            .inc();
        Ok(self
            .queue
            .add_task(conversion.into_task(item, batch.engine.clone())))
    }

    /// Runs every queued conversion and reports on the batch.
    pub async fn run(&mut self) -> Result<BatchReport, QueueError> {
        self.queue.take_finished();
        self.batch.reset_counters();

        match self.queue.run(&mut self.batch).await {
            RunOutcome::Finished(_) => {
                if let Some(failure) = self.batch.failure.take() {
                    return Err(failure);
                }
                self.batch.report.take().ok_or(QueueError::Aborted)
            }
            RunOutcome::Aborted => Err(QueueError::Aborted),
        }
    }

    /// Remote control usable while `run` is in progress.
    pub fn handle(&self) -> QueueHandle<PipelineEvent> {
        self.queue.handle()
    }

    /// Receives the aggregate progress on every tick of a run.
    pub fn subscribe_progress(&self) -> watch::Receiver<AggregateProgress> {
        self.batch.progress_tx.subscribe()
    }

    pub fn get_progress(&self) -> AggregateProgress {
        aggregate(&self.queue)
    }

    pub fn pause(&mut self) {
        self.queue.pause();
    }

    pub fn resume(&mut self) {
        self.queue.resume();
    }

    /// Stops every conversion and drops the queued ones. Partial outputs
    /// are removed.
    pub fn abort(&mut self) {
        self.queue.abort();
        QueueHooks::<Converter>::aborted(&mut self.batch);
    }

    /// Remembers for the rest of the batch that the user declined an
    /// optional step, so it is not offered again.
    pub fn decline_optional_step(&mut self) {
        self.batch.declined_optional_step = true;
    }

    pub fn declined_optional_step(&self) -> bool {
        self.batch.declined_optional_step
    }

    pub fn queue(&self) -> &TaskQueue<Converter> {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Batch {
    fn reset_counters(&mut self) {
        self.converted.clear();
        self.errors.clear();
        self.error_count = 0;
        self.duration_processed = 0.0;
        self.declined_optional_step = false;
    }

    fn record_error(&mut self, message: String) {
        self.errors.push(message);
        self.error_count += 1;
    }

    /// Moves a finished output to its target, numbering the name while it
    /// is taken.
    fn finalize(&mut self, task: &mut Converter) -> Result<PathBuf, QueueError> {
        let temp = task.handler().temp_path().to_path_buf();
        let target = self.generator.generate_target_path(task.item())?;

        if let Some(dir) = target.parent() {
            if !dir.as_os_str().is_empty() && !self.fs.exists(dir) {
                info!(path = %dir.display(), "Creating folder");
                self.fs.make_directory(dir)?;
            }
        }

        let space = if self.generator.config().replace_messy_chars {
            "_"
        } else {
            " "
        };
        let retries = self.generator.config().max_collision_retries;
        let mut candidate = target.clone();
        let mut n = 0;
        // existence is checked right before renaming; other tasks may be
        // racing for the same name
        while self.fs.exists(&candidate) {
            n += 1;
            if n > retries {
                return Err(QueueError::NoFreeName {
                    path: target,
                    attempts: retries,
                });
            }
            candidate = numbered(&target, space, n);
            metrics::NAME_COLLISIONS.inc();
        }

        debug!(from = %temp.display(), to = %candidate.display(), "Renaming");
        self.fs.rename(&temp, &candidate)?;
        Ok(candidate)
    }
}

/// `/a/b.ogg` with number 2 becomes `/a/b (2).ogg`.
fn numbered(path: &Path, space: &str, n: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let numbered = match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}{}({}){}", &name[..idx], space, n, &name[idx..]),
        _ => format!("{}{}({})", name, space, n),
    };
    path.with_file_name(numbered)
}

impl QueueHooks<Converter> for Batch {
    fn on_task_finished(&mut self, task: &mut Converter) {
        task.pipeline_mut().item_mut().set_progress(1.0);
        let uri = task.item().uri().to_string();

        let failure = task
            .error()
            .map(|e| e.to_string())
            .or_else(|| task.handler().ignored_error().map(str::to_string));
        if let Some(message) = failure {
            let temp = task.handler().temp_path();
            if self.fs.exists(temp) {
                if let Err(e) = self.fs.unlink(temp) {
                    warn!(path = %temp.display(), error = %e, "Cannot delete temp output");
                }
            }
            info!(item = %uri, error = %message, "Could not convert");
            metrics::CONVERSIONS_FINISHED.with_label_values(&["failed"]).inc();
            self.record_error(format!("{}: {}", uri, message));
            return;
        }

        let duration = task.item().duration;
        match self.finalize(task) {
            Ok(target) => {
                info!(item = %uri, target = %target.display(), "Converted");
                metrics::CONVERSIONS_FINISHED.with_label_values(&["converted"]).inc();
                if let Some(duration) = duration {
                    self.duration_processed += duration;
                    metrics::AUDIO_DURATION
                        .with_label_values(&[self.settings.output.id()])
                        .observe(duration);
                }
                self.converted.push((uri, target));
            }
            Err(e) => {
                error!(
                    item = %uri,
                    temp = %task.handler().temp_path().display(),
                    error = %e,
                    "Could not move output into place"
                );
                metrics::CONVERSIONS_FINISHED.with_label_values(&["rename_failed"]).inc();
                self.record_error(format!("{}: {}", uri, e));
            }
        }
    }

    fn on_tick(&mut self, queue: &TaskQueue<Converter>) {
        self.progress_tx.send_replace(aggregate(queue));
    }

    fn finished(&mut self, summary: &RunSummary) -> Result<(), TaskError> {
        if summary.still_running > 0 {
            self.failure = Some(QueueError::TasksStillRunning {
                count: summary.still_running,
            });
            return Err(TaskError::failed(format!(
                "{} task(s) still running at batch end",
                summary.still_running
            )));
        }

        for fault in &summary.faults {
            debug!(task = %fault.task, error = %fault.error, "Fault during batch");
        }

        let status = status_line(summary.elapsed, self.error_count);
        info!("{}", status);
        metrics::BATCH_DURATION
            .with_label_values(&[if self.error_count == 0 { "success" } else { "errors" }])
            .observe(summary.elapsed.as_secs_f64());
        if let Some(notifier) = &self.notifier {
            notifier.notify(Notification::BatchDone {
                message: status.clone(),
                error_count: self.error_count,
            });
        }

        self.progress_tx.send_replace(AggregateProgress {
            fraction: 1.0,
            active: false,
            running: Vec::new(),
        });
        self.report = Some(BatchReport {
            elapsed: summary.elapsed,
            converted: std::mem::take(&mut self.converted),
            error_count: self.error_count,
            errors: std::mem::take(&mut self.errors),
            duration_processed: self.duration_processed,
            status,
        });
        self.reset_counters();
        Ok(())
    }

    fn aborted(&mut self) {
        info!(converted = self.converted.len(), "Conversion aborted");
        metrics::BATCH_DURATION.with_label_values(&["aborted"]).observe(0.0);
        self.reset_counters();
        self.report = None;
    }
}

impl std::fmt::Debug for ConverterQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterQueue")
            .field("waiting", &self.queue.waiting_count())
            .field("running", &self.queue.running_count())
            .field("finished", &self.queue.finished_count())
            .field("errors", &self.batch.error_count)
            .finish_non_exhaustive()
    }
}
