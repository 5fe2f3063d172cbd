//! Types exchanged with the media engine.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::traits::EngineHandle;

/// Engine-side pipeline state, as reported by state-changed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Asynchronous events emitted by an engine instance.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Error(String),
    EndOfStream,
    /// Raw tags as (normalized key, value) pairs.
    Tags(Vec<(String, String)>),
    /// Decoding has started.
    PadCreated,
    StateChanged(EngineState),
    /// Detected mime type of the input.
    TypeFound(String),
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Error(_) => EventKind::Error,
            Self::EndOfStream => EventKind::EndOfStream,
            Self::Tags(_) => EventKind::Tag,
            Self::PadCreated => EventKind::PadCreated,
            Self::StateChanged(_) => EventKind::StateChanged,
            Self::TypeFound(_) => EventKind::TypeFound,
        }
    }
}

/// Discriminant of [`EngineEvent`], used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Error,
    EndOfStream,
    Tag,
    PadCreated,
    StateChanged,
    TypeFound,
}

impl EventKind {
    /// Kinds every pipeline listens to.
    pub const ALWAYS: [EventKind; 3] = [EventKind::Error, EventKind::EndOfStream, EventKind::Tag];
}

/// A launched but not yet playing engine instance.
pub struct LaunchedPipeline {
    pub handle: Box<dyn EngineHandle>,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl std::fmt::Debug for LaunchedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedPipeline").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds() {
        assert_eq!(EngineEvent::EndOfStream.kind(), EventKind::EndOfStream);
        assert_eq!(EngineEvent::Tags(vec![]).kind(), EventKind::Tag);
        assert_eq!(
            EngineEvent::StateChanged(EngineState::Playing).kind(),
            EventKind::StateChanged
        );
        assert!(EventKind::ALWAYS.contains(&EventKind::Error));
        assert!(!EventKind::ALWAYS.contains(&EventKind::PadCreated));
    }
}
