//! Declarative pipeline stages and their gst-launch rendering.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::uri;

/// One element (or caps filter) of a pipeline description.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Reads a local file.
    FileSource { path: PathBuf },
    /// Reads any URI the engine understands.
    UriSource { uri: String },
    /// A named element with properties.
    Element {
        name: String,
        properties: Vec<(String, String)>,
    },
    /// A caps filter such as `audio/x-raw,rate=44100`.
    Caps(String),
    /// Writes to a local file.
    FileSink { path: PathBuf },
}

impl Stage {
    /// Source stage for an input URI or plain path.
    pub fn source(input: &str) -> Self {
        match uri::split_scheme(input) {
            (Some(scheme), _) if scheme != "file://" => Self::UriSource {
                uri: input.to_string(),
            },
            _ => Self::FileSource {
                path: uri::to_local_path(input),
            },
        }
    }

    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a property to an element stage. Other stages are returned
    /// unchanged.
    pub fn prop(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Self::Element { properties, .. } = &mut self {
            properties.push((key.into(), value.to_string()));
        }
        self
    }

    pub fn caps(caps: impl Into<String>) -> Self {
        Self::Caps(caps.into())
    }

    pub fn file_sink(path: impl AsRef<Path>) -> Self {
        Self::FileSink {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileSource { path } => {
                write!(f, "filesrc location={}", quote(&path.to_string_lossy()))
            }
            Self::UriSource { uri } => write!(f, "giosrc location={}", quote(uri)),
            Self::Element { name, properties } => {
                write!(f, "{}", name)?;
                for (key, value) in properties {
                    write!(f, " {}={}", key, value)?;
                }
                Ok(())
            }
            Self::Caps(caps) => write!(f, "{}", caps),
            Self::FileSink { path } => {
                write!(f, "filesink location={}", quote(&path.to_string_lossy()))
            }
        }
    }
}

/// Joins stages into one description.
pub fn describe(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ! ")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
