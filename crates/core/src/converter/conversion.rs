//! The converting pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::settings::ConversionSettings;
use crate::engine::{EncoderCapabilities, EventKind, MediaEngine};
use crate::fs::FileSystem;
use crate::media::MediaItem;
use crate::notify::{Notification, Notifier};
use crate::pipeline::{ErrorDisposition, Pipeline, PipelineError, PipelineHandler, PipelineTask, Stage};
use crate::task::TaskError;

/// A pipeline task converting one item into its temp path.
pub type Converter = PipelineTask<Conversion>;

/// Converter behavior: stage assembly from the settings and ownership of
/// the temp output.
pub struct Conversion {
    settings: Arc<ConversionSettings>,
    capabilities: Arc<EncoderCapabilities>,
    temp_path: PathBuf,
    fs: Arc<dyn FileSystem>,
    notifier: Option<Notifier>,
    progress_update_freq: u32,
    ignored_error: Option<String>,
}

impl Conversion {
    pub fn new(
        temp_path: impl Into<PathBuf>,
        settings: Arc<ConversionSettings>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            settings,
            capabilities: Arc::new(EncoderCapabilities::all()),
            temp_path: temp_path.into(),
            fs,
            notifier: None,
            progress_update_freq: 1,
            ignored_error: None,
        }
    }

    /// Use detected capabilities for optional muxers and encoder fallbacks.
    pub fn with_capabilities(mut self, capabilities: Arc<EncoderCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Seconds between progress reports from the engine.
    pub fn with_progress_update_freq(mut self, seconds: u32) -> Self {
        self.progress_update_freq = seconds.max(1);
        self
    }

    /// Where the output is written until it is moved into place.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// An engine error recorded while `ignore_errors` is on.
    pub fn ignored_error(&self) -> Option<&str> {
        self.ignored_error.as_deref()
    }

    /// Builds a converter for `item`.
    pub fn into_task(self, item: MediaItem, engine: Arc<dyn MediaEngine>) -> Converter {
        PipelineTask::new(item, engine, self)
    }

    /// Removes the temp output, logging instead of failing.
    fn remove_temp(&self) {
        match self.fs.unlink(&self.temp_path) {
            Ok(()) => debug!(path = %self.temp_path.display(), "Removed temp output"),
            Err(e) if e.is_not_found() => {}
            Err(e) => info!(path = %self.temp_path.display(), error = %e, "Cannot delete temp output"),
        }
    }

    /// Creates the folder of the temp path and clears the temp path itself
    /// when overwriting.
    fn prepare_output(&self) -> Result<(), PipelineError> {
        if let Some(dir) = self.temp_path.parent() {
            if !dir.as_os_str().is_empty() && !self.fs.exists(dir) {
                info!(path = %dir.display(), "Creating folder");
                self.fs.make_directory(dir).map_err(|e| {
                    PipelineError::construction(format!(
                        "cannot create '{}' folder: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }

        if self.settings.overwrite && self.fs.exists(&self.temp_path) {
            info!(path = %self.temp_path.display(), "Overwriting");
            self.fs.unlink(&self.temp_path)?;
        }
        Ok(())
    }
}

impl PipelineHandler for Conversion {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::PadCreated]
    }

    fn stages(&mut self, pipeline: &mut Pipeline) -> Result<Vec<Stage>, PipelineError> {
        self.prepare_output()?;

        let mut stages = vec![
            Stage::source(pipeline.item().uri()),
            Stage::element("decodebin").prop("name", "decoder"),
            Stage::element("audiorate"),
            Stage::element("audioconvert"),
            Stage::element("audioresample"),
        ];
        if self.settings.resample {
            stages.push(Stage::caps(format!(
                "audio/x-raw,rate={}",
                self.settings.resample_rate
            )));
            stages.push(Stage::element("audioconvert"));
            stages.push(Stage::element("audioresample"));
        }
        if self.settings.force_mono {
            stages.push(Stage::caps("audio/x-raw,channels=1"));
            stages.push(Stage::element("audioconvert"));
        }
        stages.push(Stage::element("progressreport").prop("update-freq", self.progress_update_freq));
        stages.extend(self.settings.output.encoder_stages(&self.capabilities)?);
        stages.push(Stage::file_sink(&self.temp_path));
        Ok(stages)
    }

    fn on_error(&mut self, pipeline: &mut Pipeline, error: &PipelineError) -> ErrorDisposition {
        if self.settings.ignore_errors {
            info!(
                item = %pipeline.item().uri(),
                pipeline = pipeline.description().unwrap_or(""),
                "ignored-error: {}", error
            );
            self.ignored_error = Some(error.to_string());
            return ErrorDisposition::Ignore;
        }

        if let Some(notifier) = &self.notifier {
            notifier.notify(Notification::Error {
                title: "Engine error".to_string(),
                message: error.to_string(),
                item: Some(pipeline.item().file_name()),
            });
        }
        ErrorDisposition::Escalate
    }

    fn finished(&mut self, pipeline: &mut Pipeline, error: Option<&TaskError>) {
        if error.is_some() || self.ignored_error.is_some() {
            self.remove_temp();
            return;
        }

        let source = pipeline.item().local_path();
        if let Err(e) = self.fs.copy_permissions(&source, &self.temp_path) {
            info!(path = %self.temp_path.display(), error = %e, "Cannot set permissions");
        }

        if self.settings.delete_original && pipeline.processing {
            info!(path = %source.display(), "Deleting original");
            if let Err(e) = self.fs.unlink(&source) {
                warn!(path = %source.display(), error = %e, "Cannot remove original");
            }
        }
    }

    fn aborted(&mut self, _pipeline: &mut Pipeline) {
        self.remove_temp();
    }

    fn before_restart(&mut self, _pipeline: &mut Pipeline) {
        self.ignored_error = None;
        self.remove_temp();
    }
}

impl std::fmt::Debug for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversion")
            .field("temp_path", &self.temp_path)
            .field("output", &self.settings.output)
            .field("ignored_error", &self.ignored_error)
            .finish_non_exhaustive()
    }
}
