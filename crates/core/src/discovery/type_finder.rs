//! Type detection pass.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{EventKind, MediaEngine};
use crate::media::MediaItem;
use crate::pipeline::{ErrorDisposition, Pipeline, PipelineError, PipelineHandler, PipelineTask, Stage};

pub type TypeFinderTask = PipelineTask<TypeFinder>;

/// Mime families worth converting. A detected type is accepted when it
/// contains one of these.
pub const MIME_WHITELIST: &[&str] = &[
    "audio/",
    "video/",
    "application/ogg",
    "application/x-id3",
    "application/x-ape",
    "application/vnd.rn-realmedia",
    "application/x-pn-realaudio",
    "application/x-shockwave-flash",
    "application/x-3gp",
];

/// Files skipped whatever their detected type.
pub const FILENAME_BLACKLIST: &[&str] = &[
    "*.jpg", "*.jpeg", "*.png", "*.gif", "*.bmp", "*.cue", "*.log", "*.m3u", "*.m3u8", "*.nfo",
    "*.pdf", "*.pls", "*.sfv", "*.txt", "*.iso",
];

static BLACKLIST_RE: Lazy<Vec<Regex>> = Lazy::new(|| {
    FILENAME_BLACKLIST
        .iter()
        .map(|glob| Regex::new(&glob_to_regex(glob)).expect("blacklist globs are valid"))
        .collect()
});

fn glob_to_regex(glob: &str) -> String {
    let mut re = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex_lite::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    re
}

/// Whether a detected mime type belongs to a whitelisted family.
pub fn accepts_mime(mime: &str) -> bool {
    MIME_WHITELIST.iter().any(|family| mime.contains(family))
}

/// Whether a path or URI matches a blacklisted file name pattern.
pub fn is_blacklisted(uri: &str) -> bool {
    BLACKLIST_RE.iter().any(|re| re.is_match(uri))
}

/// Records the detected mime type of an item and stops at the first
/// decoded pad.
///
/// `item.mime_type` ends up `None` for anything not worth converting.
#[derive(Debug, Default)]
pub struct TypeFinder {
    detected: Option<String>,
}

impl TypeFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(item: MediaItem, engine: Arc<dyn MediaEngine>) -> TypeFinderTask {
        PipelineTask::new(item, engine, Self::new())
    }

    /// The raw type reported by the engine, accepted or not.
    pub fn detected(&self) -> Option<&str> {
        self.detected.as_deref()
    }
}

impl PipelineHandler for TypeFinder {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::PadCreated, EventKind::TypeFound]
    }

    fn stages(&mut self, pipeline: &mut Pipeline) -> Result<Vec<Stage>, PipelineError> {
        Ok(super::decode_only(pipeline))
    }

    fn on_error(&mut self, pipeline: &mut Pipeline, error: &PipelineError) -> ErrorDisposition {
        info!(item = %pipeline.item().uri(), "ignored-error: {}", error);
        ErrorDisposition::Ignore
    }

    fn on_type_found(&mut self, pipeline: &mut Pipeline, mime: &str) {
        debug!(item = %pipeline.item().uri(), mime, "Type found");
        self.detected = Some(mime.to_string());

        let item = pipeline.item_mut();
        item.mime_type = None;
        if accepts_mime(mime) {
            item.mime_type = Some(mime.to_string());
        } else {
            info!(item = %item.uri(), "mime type skipped: {}", mime);
        }
        if is_blacklisted(item.uri()) {
            item.mime_type = None;
            info!(item = %item.uri(), "filename blacklisted");
        }
    }

    fn on_pad_created(&mut self, pipeline: &mut Pipeline) {
        // the duration was queried right before this hook
        pipeline.done();
    }
}
