//! Input items and the metadata discovered about them.
//!
//! A [`MediaItem`] is created when an input file is enumerated and is then
//! mutated by exactly one pipeline at a time while it reads tags, duration
//! and mime type.

mod item;
mod tags;

pub use item::MediaItem;
pub use tags::{TagMap, TagValue, TAG_WHITELIST};
