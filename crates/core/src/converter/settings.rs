//! Conversion settings.

use serde::{Deserialize, Serialize};

use super::format::OutputFormat;

/// What every converter of a batch does with its input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    /// Target format and its quality knob.
    #[serde(default)]
    pub output: OutputFormat,

    /// Resample to `resample_rate`.
    #[serde(default)]
    pub resample: bool,

    /// Target sample rate in Hz when resampling.
    #[serde(default = "default_resample_rate")]
    pub resample_rate: u32,

    /// Downmix to one channel.
    #[serde(default)]
    pub force_mono: bool,

    /// Remove a file already sitting at the temp path before writing.
    #[serde(default)]
    pub overwrite: bool,

    /// Delete each input after a successful conversion.
    #[serde(default)]
    pub delete_original: bool,

    /// Record engine errors without failing the task.
    #[serde(default)]
    pub ignore_errors: bool,

    /// Use `.oga` instead of `.ogg` for Vorbis.
    #[serde(default)]
    pub vorbis_oga_extension: bool,
}

fn default_resample_rate() -> u32 {
    48000
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            output: OutputFormat::default(),
            resample: false,
            resample_rate: default_resample_rate(),
            force_mono: false,
            overwrite: false,
            delete_original: false,
            ignore_errors: false,
            vorbis_oga_extension: false,
        }
    }
}

impl ConversionSettings {
    /// Extension of converted files, without dot.
    pub fn extension(&self) -> &'static str {
        self.output.extension(self.vorbis_oga_extension)
    }

    /// Sets the output format.
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Enables resampling to `rate`.
    pub fn with_resample(mut self, rate: u32) -> Self {
        self.resample = true;
        self.resample_rate = rate;
        self
    }
}
