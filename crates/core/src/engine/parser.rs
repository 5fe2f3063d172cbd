//! Line parser for `gst-launch-1.0 -m -t -v` output.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{EngineEvent, EngineState};

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\S+ \(\d+:\d{2}:\d{2}\): (\d+)(?: / (\d+))? seconds")
        .expect("progress regex is valid")
});

static TYPEFIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"GstTypeFindElement:[^ ]*\.GstPad:src: caps = ([A-Za-z0-9.+/_-]+)")
        .expect("typefind regex is valid")
});

static STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Setting pipeline to (NULL|READY|PAUSED|PLAYING)").expect("state regex is valid")
});

static TAG_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+([A-Za-z][A-Za-z0-9 _-]*?)\s*: (.*)$").expect("tag line regex is valid")
});

/// One interpreted output line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Event(EngineEvent),
    /// Position and, when known, duration in seconds.
    Progress {
        position: f64,
        duration: Option<f64>,
    },
}

/// Stateful parser; tag blocks span several lines.
#[derive(Debug, Default)]
pub struct OutputParser {
    tag_block: Option<Vec<(String, String)>>,
    type_found: bool,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line, returning whatever it completes.
    pub fn feed(&mut self, line: &str) -> Vec<ParsedLine> {
        let mut out = Vec::new();

        if let Some(block) = self.tag_block.as_mut() {
            if let Some(caps) = TAG_LINE_RE.captures(line) {
                block.push((normalize_tag_nick(&caps[1]), caps[2].trim().to_string()));
                return out;
            }
            if let Some(tags) = self.flush() {
                out.push(ParsedLine::Event(tags));
            }
        }

        if line.starts_with("FOUND TAG") {
            self.tag_block = Some(Vec::new());
        } else if let Some(message) = error_message(line) {
            out.push(ParsedLine::Event(EngineEvent::Error(message)));
        } else if line.starts_with("Got EOS") {
            out.push(ParsedLine::Event(EngineEvent::EndOfStream));
        } else if line.starts_with("Pipeline is PREROLLED") {
            out.push(ParsedLine::Event(EngineEvent::PadCreated));
        } else if let Some(caps) = STATE_RE.captures(line) {
            let state = match &caps[1] {
                "NULL" => EngineState::Null,
                "READY" => EngineState::Ready,
                "PAUSED" => EngineState::Paused,
                _ => EngineState::Playing,
            };
            out.push(ParsedLine::Event(EngineEvent::StateChanged(state)));
        } else if let Some(caps) = PROGRESS_RE.captures(line) {
            if let Ok(position) = caps[1].parse::<f64>() {
                let duration = caps
                    .get(2)
                    .and_then(|d| d.as_str().parse::<f64>().ok())
                    .filter(|d| *d > 0.0);
                out.push(ParsedLine::Progress { position, duration });
            }
        } else if !self.type_found {
            if let Some(caps) = TYPEFIND_RE.captures(line) {
                self.type_found = true;
                out.push(ParsedLine::Event(EngineEvent::TypeFound(caps[1].to_string())));
            }
        }

        out
    }

    /// Flushes a pending tag block at end of output.
    pub fn finish(&mut self) -> Option<EngineEvent> {
        self.flush()
    }

    fn flush(&mut self) -> Option<EngineEvent> {
        self.tag_block
            .take()
            .filter(|tags| !tags.is_empty())
            .map(EngineEvent::Tags)
    }
}

fn error_message(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix("ERROR: ") {
        return Some(rest.trim().to_string());
    }
    line.strip_prefix("WARNING: erroneous pipeline: ")
        .map(|rest| format!("erroneous pipeline: {}", rest.trim()))
}

/// Maps a printed tag nick to the key used in tag maps.
///
/// `track number` becomes `track-number`; the disc tags are stored under
/// their album-prefixed names.
pub fn normalize_tag_nick(nick: &str) -> String {
    let key = nick.trim().to_lowercase().replace([' ', '_'], "-");
    match key.as_str() {
        "disc-number" => "album-disc-number".to_string(),
        "disc-count" => "album-disc-count".to_string(),
        _ => key,
    }
}
