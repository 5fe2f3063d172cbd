//! Batch conversion queue.
//!
//! [`ConverterQueue`] feeds converters to a [`crate::task::TaskQueue`],
//! resolves target name collisions as each output finishes and reports on
//! the whole batch.
//!
//! # Example
//!
//! ```ignore
//! let mut queue = ConverterQueue::new(engine, fs, settings, naming, &QueueConfig::default())?;
//! for path in inputs {
//!     queue.add(MediaItem::new(path))?;
//! }
//! let report = queue.run().await?;
//! println!("{}", report.status);
//! ```

mod config;
mod converter_queue;
mod error;
mod progress;
mod report;

pub use config::QueueConfig;
pub use converter_queue::ConverterQueue;
pub use error::QueueError;
pub use progress::{aggregate, AggregateProgress};
pub use report::{format_time, status_line, BatchReport};
