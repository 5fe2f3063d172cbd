//! Converting pipelines.
//!
//! A [`Converter`] decodes one input, optionally resamples and downmixes
//! it, encodes it with the configured [`OutputFormat`] and writes the
//! result to a private temp path. Moving the output into place is left to
//! the queue.
//!
//! # Example
//!
//! ```ignore
//! use sonata_core::converter::{Conversion, ConversionSettings, OutputFormat};
//!
//! let settings = Arc::new(ConversionSettings::default().with_output(OutputFormat::Flac { compression: 5 }));
//! let converter = Conversion::new("/music/a.flac~x1y2z3~SC~", settings, fs)
//!     .into_task(MediaItem::new("/music/a.wav"), engine);
//! ```

mod conversion;
mod format;
mod settings;

pub use conversion::{Conversion, Converter};
pub use format::{Mp3Mode, OutputFormat};
pub use settings::ConversionSettings;
