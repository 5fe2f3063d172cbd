//! Target path generation.
//!
//! Naming is split into three layers:
//! - [`fill_pattern`]: the `%(key)s` / `%(key)02d` pattern mini-language
//! - [`escape_path`] / [`escape_child`]: collision-aware escaping that keeps
//!   the part of a path that already exists and transliterates the rest
//! - [`TargetNameGenerator`]: per-batch snapshot of the naming settings that
//!   combines both into temp and target paths

mod config;
mod error;
mod escape;
mod generator;
mod pattern;

pub use config::NamingConfig;
pub use error::NamingError;
pub use escape::{escape_child, escape_path, safe_string};
pub use generator::TargetNameGenerator;
pub use pattern::{build_tokens, fill_pattern, Tokens};
