//! Narrow filesystem interface consumed by the core.
//!
//! Everything that touches the output namespace goes through
//! [`FileSystem`], so naming and finalization can be tested against an
//! in-memory namespace (see `testing::MemoryFs`).

mod error;
mod local;
mod traits;

pub use error::FsError;
pub use local::LocalFs;
pub use traits::FileSystem;
