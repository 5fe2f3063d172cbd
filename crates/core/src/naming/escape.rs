//! Collision-aware path escaping.
//!
//! Segments are walked from the left while the accumulated (decoded) path
//! exists; those are kept as they are on disk, so folders created by an earlier run (already
//! transliterated) are matched exactly. The first missing segment and
//! everything after it is percent-decoded, reduced to ASCII and filtered to
//! `[A-Za-z0-9._/-]`, without probing further.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use unicode_normalization::UnicodeNormalization;

use super::error::NamingError;
use crate::uri;

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^/]+|/+[^/]*").expect("segment regex is valid"));

/// Reduces a string to ASCII letters, digits and `._/-`.
///
/// Compatibility-decomposes first so accented letters keep their base
/// letter; other non-ASCII characters are dropped and remaining disallowed
/// characters become `_`. A leading scheme is kept as is.
pub fn safe_string(input: &str) -> String {
    let (scheme, rest) = uri::split_scheme(input);
    let decoded = uri::decode(rest);
    let filtered: String = decoded
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", scheme.unwrap_or(""), filtered)
}

/// Escapes a full candidate path, preserving its scheme.
///
/// `exists` is asked about growing prefixes of the candidate, scheme
/// included.
pub fn escape_path(candidate: &str, exists: impl Fn(&str) -> bool) -> String {
    let (scheme, rest) = uri::split_scheme(candidate);
    let scheme = scheme.unwrap_or("");
    format!("{}{}", scheme, walk(scheme, rest, exists))
}

/// Escapes `child` below an already safe `parent`.
///
/// An absolute child keeps only the scheme of the parent. A relative one
/// is appended to the parent with a single `/`; a leading `./` or `.` is
/// dropped.
pub fn escape_child(
    child: &str,
    parent: &str,
    exists: impl Fn(&str) -> bool,
) -> Result<String, NamingError> {
    if child.is_empty() {
        return Err(NamingError::EmptyName);
    }
    if uri::is_uri(child) {
        return Err(NamingError::ChildIsUri {
            child: child.to_string(),
        });
    }

    let parent = if child.starts_with('/') {
        uri::split_scheme(parent).0.unwrap_or("").to_string()
    } else if parent.is_empty() || parent.ends_with('/') {
        parent.to_string()
    } else {
        format!("{}/", parent)
    };

    let child = child
        .strip_prefix("./")
        .or_else(|| child.strip_prefix('.'))
        .unwrap_or(child);

    Ok(format!("{}{}", parent, walk(&parent, child, exists)))
}

fn walk(prefix: &str, path: &str, exists: impl Fn(&str) -> bool) -> String {
    let mut safe = String::with_capacity(path.len());
    for m in SEGMENT_RE.find_iter(path) {
        let segment = uri::decode(m.as_str());
        let candidate = format!("{}{}{}", prefix, safe, segment);
        if exists(&candidate) {
            safe.push_str(&segment);
        } else {
            safe.push_str(&safe_string(&path[m.start()..]));
            break;
        }
    }
    safe
}
