//! The `%(key)s` pattern mini-language.
//!
//! Supported directives: `%(key)s`, `%(key)d` (and `i`), with optional `-`
//! (left align) and `0` (zero pad) flags and a width of at most 255, e.g.
//! `%(track-number)02d`. `%%` is a literal percent sign.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use super::error::NamingError;
use crate::media::{MediaItem, TagValue};

/// Values available to patterns.
pub type Tokens = BTreeMap<String, TagValue>;

/// Builds the token dictionary for an item.
///
/// Defaults come first and are overridden by the item's tags. Slashes in
/// tag values become `-`, counters are made numeric and `album-artist`
/// falls back to `artist`.
pub fn build_tokens(item: &MediaItem, target_ext: &str, now: &DateTime<Local>) -> Tokens {
    let (stem, ext) = item.stem_and_extension();
    let mut tokens = Tokens::new();
    let mut set = |k: &str, v: TagValue| {
        tokens.insert(k.to_string(), v);
    };

    set(".inputname", stem.clone().into());
    set(".ext", ext.into());
    set(".target-ext", target_ext.trim_start_matches('.').into());
    set("album", "Unknown Album".into());
    set("artist", "Unknown Artist".into());
    set("album-artist", "Unknown Artist".into());
    set("title", stem.into());
    set("track-number", TagValue::Integer(0));
    set("track-count", TagValue::Integer(0));
    set("genre", "Unknown Genre".into());
    set("year", "Unknown Year".into());
    set("date", "Unknown Date".into());
    set("album-disc-number", TagValue::Integer(0));
    set("album-disc-count", TagValue::Integer(0));

    for (key, value) in item.tags.iter() {
        let value = match value {
            TagValue::Text(text) => {
                let text = text.replace('/', "-");
                let counter = key.ends_with("-number") || key.ends_with("-count");
                match text.trim().parse::<i64>() {
                    Ok(n) if counter => TagValue::Integer(n),
                    _ => TagValue::Text(text),
                }
            }
            other => other.clone(),
        };
        tokens.insert(key.clone(), value);
    }

    if item.tags.contains("artist") && !item.tags.contains("album-artist") {
        if let Some(artist) = tokens.get("artist").cloned() {
            tokens.insert("album-artist".to_string(), artist);
        }
    }

    tokens.insert(
        "timestamp".to_string(),
        now.format("%Y%m%d_%H_%M_%S").to_string().into(),
    );
    tokens
}

/// Substitutes every directive of `pattern` from `tokens`.
pub fn fill_pattern(pattern: &str, tokens: &Tokens) -> Result<String, NamingError> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('(') => {
                let directive = parse_directive(pattern, &mut chars)?;
                let value = tokens
                    .get(&directive.key)
                    .ok_or_else(|| NamingError::UnknownKey {
                        key: directive.key.clone(),
                    })?;
                out.push_str(&directive.render(value));
            }
            _ => return Err(NamingError::bad_pattern(pattern, "expected '(' or '%' after '%'")),
        }
    }
    Ok(out)
}

/// Widest padding a directive may ask for; path components cannot be longer.
const MAX_WIDTH: usize = 255;

#[derive(Debug)]
struct Directive {
    key: String,
    left: bool,
    zero: bool,
    width: usize,
    numeric: bool,
}

fn parse_directive(pattern: &str, chars: &mut Peekable<Chars<'_>>) -> Result<Directive, NamingError> {
    let mut key = String::new();
    loop {
        match chars.next() {
            Some(')') => break,
            Some(c) => key.push(c),
            None => return Err(NamingError::bad_pattern(pattern, "unterminated key")),
        }
    }

    let (mut left, mut zero) = (false, false);
    while let Some(&flag) = chars.peek() {
        match flag {
            '-' => left = true,
            '0' => zero = true,
            _ => break,
        }
        chars.next();
    }

    let mut width = 0usize;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        width = width.saturating_mul(10).saturating_add(digit as usize);
        if width > MAX_WIDTH {
            return Err(NamingError::bad_pattern(
                pattern,
                format!("field width exceeds {}", MAX_WIDTH),
            ));
        }
        chars.next();
    }

    let numeric = match chars.next() {
        Some('s') => false,
        Some('d') | Some('i') => true,
        Some(other) => {
            return Err(NamingError::bad_pattern(
                pattern,
                format!("unsupported conversion '{}'", other),
            ))
        }
        None => return Err(NamingError::bad_pattern(pattern, "missing conversion")),
    };

    Ok(Directive {
        key,
        left,
        zero,
        width,
        numeric,
    })
}

impl Directive {
    fn render(&self, value: &TagValue) -> String {
        if self.numeric {
            if let Some(n) = value.as_integer() {
                if self.zero && !self.left {
                    return format!("{:0width$}", n, width = self.width);
                }
                return self.pad(n.to_string());
            }
        }
        // text under %d is rendered verbatim
        self.pad(value.to_string())
    }

    fn pad(&self, text: String) -> String {
        if self.left {
            format!("{:<width$}", text, width = self.width)
        } else {
            format!("{:>width$}", text, width = self.width)
        }
    }
}
