//! Metadata tags discovered by the media engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tags the engine is allowed to contribute. Everything else is dropped.
pub const TAG_WHITELIST: &[&str] = &[
    "album-artist",
    "artist",
    "album",
    "title",
    "track-number",
    "track-count",
    "genre",
    "datetime",
    "year",
    "timestamp",
    "album-disc-number",
    "album-disc-count",
];

/// A single tag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Integer(i64),
    Text(String),
}

impl TagValue {
    /// Returns the value as an integer if it is one, or parses as one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for TagValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// Tag map keyed by whitelisted tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMap(BTreeMap<String, TagValue>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts a tag without whitelist filtering.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges raw `(name, value)` pairs reported by the engine.
    ///
    /// Names outside [`TAG_WHITELIST`] are dropped. A `datetime` tag is
    /// expanded into `year` and a `YYYY-MM-DD` `date`. Returns how many
    /// entries were accepted.
    pub fn merge_raw<I, K, V>(&mut self, raw: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut accepted = 0;
        for (key, value) in raw {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            if !TAG_WHITELIST.contains(&key) {
                continue;
            }
            accepted += 1;

            if key == "datetime" {
                if let Some(year) = value.get(..4).and_then(|y| y.parse::<i64>().ok()) {
                    self.insert("year", year);
                }
                if let Some(date) = value.get(..10) {
                    self.insert("date", date);
                }
            }
            self.insert(key, value);
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_drops_unknown_tags() {
        let mut tags = TagMap::new();
        let accepted = tags.merge_raw([
            ("title", "Hi Ho"),
            ("encoder", "Lavf58"),
            ("artist", "Foo Bar"),
        ]);
        assert_eq!(accepted, 2);
        assert_eq!(tags.get("title"), Some(&TagValue::from("Hi Ho")));
        assert!(!tags.contains("encoder"));
    }

    #[test]
    fn test_merge_expands_datetime() {
        let mut tags = TagMap::new();
        tags.merge_raw([("datetime", "2004-03-21T10:00:00Z")]);
        assert_eq!(tags.get("year"), Some(&TagValue::Integer(2004)));
        assert_eq!(tags.get("date"), Some(&TagValue::from("2004-03-21")));
    }

    #[test]
    fn test_merge_year_only_datetime() {
        let mut tags = TagMap::new();
        tags.merge_raw([("datetime", "1999")]);
        assert_eq!(tags.get("year"), Some(&TagValue::Integer(1999)));
        assert!(!tags.contains("date"));
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(TagValue::from(" 07 ").as_integer(), Some(7));
        assert_eq!(TagValue::Integer(3).as_integer(), Some(3));
        assert_eq!(TagValue::from("seven").as_integer(), None);
    }
}
