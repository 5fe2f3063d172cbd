//! External media engine.
//!
//! The engine receives one declarative pipeline description per pipeline
//! and reports back through an asynchronous event stream. The production
//! implementation drives `gst-launch-1.0`; tests use
//! [`crate::testing::MockEngine`].

mod capabilities;
mod config;
mod error;
mod gst_launch;
mod parser;
mod traits;
mod types;

pub use capabilities::EncoderCapabilities;
pub use config::EngineConfig;
pub use error::EngineError;
pub use gst_launch::{tokenize_description, GstLaunchEngine};
pub use parser::{OutputParser, ParsedLine};
pub use traits::{EngineHandle, MediaEngine};
pub use types::{EngineEvent, EngineState, EventKind, LaunchedPipeline};
