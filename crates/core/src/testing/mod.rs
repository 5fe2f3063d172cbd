//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the engine and filesystem
//! traits, allowing whole batches to run without GStreamer or a real
//! output directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use sonata_core::testing::{MemoryFs, MockEngine, Script};
//!
//! let fs = Arc::new(MemoryFs::new());
//! let engine = MockEngine::new()
//!     .with_default(Script::success(180.0))
//!     .writing_to(fs.clone());
//! ```

mod memory_fs;
mod mock_engine;

pub use memory_fs::MemoryFs;
pub use mock_engine::{MockEngine, Script};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::media::{MediaItem, TagValue};

    /// An item below `/in` carrying the given tags.
    pub fn tagged_item(file: &str, tags: &[(&str, TagValue)]) -> MediaItem {
        let mut item = MediaItem::with_base_path(format!("/in/{}", file), "/in");
        for (key, value) in tags {
            item.tags.insert(*key, value.clone());
        }
        item
    }
}
