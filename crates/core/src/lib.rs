pub mod config;
pub mod converter;
pub mod discovery;
pub mod engine;
pub mod fs;
pub mod media;
pub mod metrics;
pub mod naming;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod task;
pub mod testing;
pub mod uri;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError,
};
pub use converter::{Conversion, ConversionSettings, Converter, Mp3Mode, OutputFormat};
pub use discovery::{TagReader, TypeFinder};
pub use engine::{EncoderCapabilities, EngineConfig, EngineError, GstLaunchEngine, MediaEngine};
pub use fs::{FileSystem, FsError, LocalFs};
pub use media::{MediaItem, TagMap, TagValue};
pub use naming::{NamingConfig, NamingError, TargetNameGenerator};
pub use notify::{Notification, NotificationEnvelope, Notifier};
pub use pipeline::{Pipeline, PipelineError, PipelineHandler, PipelineTask};
pub use queue::{AggregateProgress, BatchReport, ConverterQueue, QueueConfig, QueueError};
pub use task::{Task, TaskError, TaskId, TaskQueue, TaskState};
