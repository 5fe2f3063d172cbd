//! Error types for the naming module.

use thiserror::Error;

/// Errors raised while generating names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The pattern references a key that has no value.
    #[error("Unknown key in pattern: {key}")]
    UnknownKey { key: String },

    /// The pattern is malformed.
    #[error("Invalid pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },

    /// Patterns are relative; schemes belong in the target folder.
    #[error("Pattern must not be a URI: {pattern}")]
    PatternIsUri { pattern: String },

    /// Output is not next to the input, but no folder was selected.
    #[error("No target folder selected")]
    SelectedFolderMissing,

    #[error("Cannot escape an empty name")]
    EmptyName,

    /// A child path passed for escaping carries its own scheme.
    #[error("Expected a child path, not a URI: {child}")]
    ChildIsUri { child: String },

    /// No free temporary name was found.
    #[error("No free temporary name in {folder}")]
    TempPathExhausted { folder: String },
}

impl NamingError {
    pub fn bad_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::BadPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
