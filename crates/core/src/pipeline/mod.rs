//! Pipeline state machine over the external media engine.
//!
//! A [`Pipeline`] holds the item being processed, the engine instance and
//! the event subscription of one run. [`PipelineTask`] wraps it into a
//! [`crate::task::Task`] and delegates the behavior that differs between
//! conversion and discovery passes to a [`PipelineHandler`].
//!
//! ```text
//! Idle ──play──▶ Running ⇄ Paused
//!                   │
//!                   ├─ end-of-stream ──▶ Done
//!                   ├─ error ──────────▶ Errored
//!                   └─ cancel ─────────▶ Aborted
//! ```

mod connection;
mod error;
mod pipeline;
mod stage;
mod task;

pub use connection::{Connection, PipelineEvent};
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use stage::{describe, Stage};
pub use task::{ErrorDisposition, PipelineHandler, PipelineTask};
