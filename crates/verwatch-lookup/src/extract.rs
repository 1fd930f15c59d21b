//! Version extraction from a response
//!
//! The raw response (body or header value) goes through up to two stages:
//!
//! 1. **JSON path**: `foo.bar[1].baz` walks objects by key and arrays by
//!    index (negative indices count from the end). The value found must be a
//!    string or a number.
//! 2. **Regex**: the first match of the pattern is rendered with the
//!    template, or reduced to its last capture group when there is none.

use std::fmt;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{LookupError, Result};

/// Longest excerpt of a body quoted in an error
const BODY_EXCERPT: usize = 250;
/// Longest excerpt of the searched text quoted in a regex error
const REGEX_EXCERPT: usize = 100;

/// One step of a JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Split a JSON path into segments
///
/// `"foo.bar[1].bash"` gives `[Key(foo), Key(bar), Index(1), Key(bash)]`.
/// Empty keys (`a..b`) are skipped.
pub fn parse_json_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut rest = path;

    while let Some(c) = rest.chars().next() {
        match c {
            '.' => rest = &rest[1..],
            '[' => {
                let inner = &rest[1..];
                let end = inner.find(']').unwrap_or(inner.len());
                let index = &inner[..end];
                let index = index.parse::<i64>().map_err(|_| {
                    LookupError::invalid_config(format!(
                        "failed to parse index {:?} in {:?}",
                        index, path
                    ))
                })?;
                segments.push(PathSegment::Index(index));
                rest = inner.get(end + 1..).unwrap_or("");
            }
            _ => {
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                segments.push(PathSegment::Key(rest[..end].to_string()));
                rest = &rest[end..];
            }
        }
    }

    Ok(segments)
}

/// Find the scalar at `path` in a JSON body.
///
/// `source` names where the body came from in errors.
pub fn value_at_path(body: &str, path: &str, source: &str) -> Result<String> {
    let document: Value = serde_json::from_str(body).map_err(|_| {
        LookupError::extraction(format!(
            "failed to unmarshal the following from {:?} into json: {:?}",
            source,
            truncate(body, BODY_EXCERPT)
        ))
    })?;

    let segments = parse_json_path(path)?;
    let mut current = &document;
    for segment in &segments {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(key),
            (Value::Array(items), PathSegment::Index(index)) => {
                resolve_index(*index, items.len()).and_then(|i| items.get(i))
            }
            (Value::String(_) | Value::Number(_), _) => {
                return Err(LookupError::extraction(format!(
                    "got a value of {:?} at {:?}, but there are more keys to navigate: {}",
                    scalar(current).unwrap_or_default(),
                    segment.to_string(),
                    path
                )));
            }
            _ => None,
        }
        .ok_or_else(|| {
            LookupError::extraction(format!(
                "{:?} could not be found in the following JSON. Failed at {:?}:\n{}",
                path,
                segment.to_string(),
                truncate(body, BODY_EXCERPT)
            ))
        })?;
    }

    scalar(current).ok_or_else(|| {
        LookupError::extraction(format!(
            "failed to find value for {:?} in {}",
            path,
            truncate(body, BODY_EXCERPT)
        ))
    })
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Apply `pattern` to `text` and render the first match
pub fn apply_regex(text: &str, pattern: &str, template: &str) -> Result<String> {
    let re = Regex::new(pattern).map_err(|e| {
        LookupError::invalid_config(format!("regex: {:?} <invalid> ({})", pattern, e))
    })?;

    let captures = re.captures(text).ok_or_else(|| {
        LookupError::extraction(format!(
            "regex {:?} didn't return any matches on {:?}",
            pattern,
            truncate(text, REGEX_EXCERPT)
        ))
    })?;

    Ok(render_template(&captures, template))
}

/// Render a regex match.
///
/// Without capture groups the whole match is used. Otherwise an empty
/// template selects the last group, and a template has `$N` replaced by
/// group `N` (highest first, so `$10` is not read as `$1` + `0`).
/// Placeholders with no matching group stay as written.
pub fn render_template(captures: &Captures<'_>, template: &str) -> String {
    let group = |i: usize| captures.get(i).map_or("", |m| m.as_str());

    let groups = captures.len();
    if groups == 1 {
        return group(0).to_string();
    }
    if template.is_empty() {
        return group(groups - 1).to_string();
    }

    let mut rendered = template.to_string();
    for i in (1..groups).rev() {
        rendered = rendered.replace(&format!("${}", i), group(i));
    }
    rendered
}

/// Run the extraction pipeline over a raw response
pub fn extract_version(
    raw: &str,
    json: &str,
    regex: &str,
    regex_template: &str,
    source: &str,
) -> Result<String> {
    let text = if json.is_empty() {
        raw.to_string()
    } else {
        value_at_path(raw, json, source)?
    };

    if regex.is_empty() {
        return Ok(text);
    }
    apply_regex(&text, regex, regex_template)
}

/// Cut `message` to at most `max` characters
pub fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &message[..end]),
        None => message.to_string(),
    }
}
