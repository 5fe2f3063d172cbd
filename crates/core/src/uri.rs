//! Helpers for the mix of plain paths and `scheme://` URIs the core handles.

use std::borrow::Cow;
use std::path::PathBuf;

/// Splits a leading `scheme://` off a string.
///
/// Returns `(Some("file://"), "/music/a.flac")` for `file:///music/a.flac`
/// and `(None, input)` for anything without a scheme.
pub fn split_scheme(input: &str) -> (Option<&str>, &str) {
    if let Some(idx) = input.find("://") {
        let scheme = &input[..idx];
        if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic()) {
            let end = idx + 3;
            return (Some(&input[..end]), &input[end..]);
        }
    }
    (None, input)
}

/// Whether the string starts with a `scheme://` prefix.
pub fn is_uri(input: &str) -> bool {
    split_scheme(input).0.is_some()
}

/// Percent-decodes a string, leaving it untouched if it is not valid UTF-8
/// after decoding.
pub fn decode(input: &str) -> Cow<'_, str> {
    match urlencoding::decode(input) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(input),
    }
}

/// Converts a `file://` URI or a plain path into a local filesystem path.
///
/// Other schemes are passed through undecoded, the filesystem will simply
/// not find them.
pub fn to_local_path(input: &str) -> PathBuf {
    match split_scheme(input) {
        (Some("file://"), rest) => PathBuf::from(decode(rest).into_owned()),
        (Some(_), _) => PathBuf::from(input),
        (None, path) => PathBuf::from(path),
    }
}

/// Returns the parent portion of a path or URI, without trailing slash.
pub fn parent(input: &str) -> &str {
    match input.rfind('/') {
        Some(0) => "/",
        Some(idx) => &input[..idx],
        None => "",
    }
}

/// Returns the last path segment of a path or URI.
pub fn file_name(input: &str) -> &str {
    match input.rfind('/') {
        Some(idx) => &input[idx + 1..],
        None => input,
    }
}

/// Joins two path fragments with exactly one `/`.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return child.to_string();
    }
    let child = child.trim_start_matches('/');
    if parent.ends_with('/') {
        format!("{}{}", parent, child)
    } else {
        format!("{}/{}", parent, child)
    }
}
