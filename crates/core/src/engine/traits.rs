//! Trait definitions for the engine module.

use async_trait::async_trait;

use super::error::EngineError;
use super::types::LaunchedPipeline;

/// A media-processing engine addressed through pipeline descriptions.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Materializes a pipeline description without starting it.
    ///
    /// Description errors may surface here or later as an
    /// [`super::EngineEvent::Error`] once the pipeline plays.
    fn launch(&self, description: &str) -> Result<LaunchedPipeline, EngineError>;

    /// Validates that the engine is installed and usable.
    async fn validate(&self) -> Result<(), EngineError>;

    /// Whether an element of the given name is available.
    async fn has_element(&self, element: &str) -> bool;
}

/// Control surface of one live engine instance.
///
/// Queries are best effort: `None` means unknown, not failure.
pub trait EngineHandle: Send {
    fn play(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    /// Total duration in seconds.
    fn query_duration(&self) -> Option<f64>;

    /// Current position in seconds.
    fn query_position(&self) -> Option<f64>;

    /// Stops the instance. Safe to call repeatedly.
    fn stop(&mut self);
}
