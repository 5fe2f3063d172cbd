//! Discovery passes run before converting: reading tags and detecting
//! whether a file is something the engine can decode at all.

mod tag_reader;
mod type_finder;

pub use tag_reader::{TagReader, TagReaderTask};
pub use type_finder::{
    accepts_mime, is_blacklisted, TypeFinder, TypeFinderTask, FILENAME_BLACKLIST, MIME_WHITELIST,
};

use crate::pipeline::{Pipeline, Stage};

/// `source ! decodebin ! fakesink`, shared by both passes.
fn decode_only(pipeline: &Pipeline) -> Vec<Stage> {
    vec![
        Stage::source(pipeline.item().uri()),
        Stage::element("decodebin").prop("name", "decoder"),
        Stage::element("fakesink"),
    ]
}
