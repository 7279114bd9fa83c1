//! Tolerant extraction of a JSON object from model output.
//!
//! Each tier is a pure function that can be exercised on its own:
//!
//! 1. [`parse_direct`]: the whole text is one object.
//! 2. [`parse_fenced`]: the interior of a fenced code block.
//! 3. [`parse_repaired`]: the whole text after [`repair`].
//! 4. [`parse_brace_candidates`]: balanced `{...}` spans, longest first.
//!
//! [`extract`] runs the tiers in order and never fails; it returns `None`
//! when nothing yields a non-empty object.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// A parsed JSON object.
pub type JsonObject = Map<String, Value>;

static FENCED_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok());

/// Extract the first non-empty JSON object found by the tiers.
pub fn extract(text: &str) -> Option<JsonObject> {
    if let Some(object) = parse_direct(text) {
        tracing::debug!("Extracted object by direct parse");
        return Some(object);
    }
    if let Some(object) = parse_fenced(text) {
        tracing::debug!("Extracted object from fenced block");
        return Some(object);
    }
    if let Some(object) = parse_repaired(text) {
        tracing::debug!("Extracted object after repair");
        return Some(object);
    }
    if let Some(object) = parse_brace_candidates(text) {
        tracing::debug!("Extracted object from brace scan");
        return Some(object);
    }

    tracing::debug!(chars = text.len(), "No JSON object found in model output");
    None
}

/// Tier 1: parse the text as-is.
pub fn parse_direct(text: &str) -> Option<JsonObject> {
    parse_object(text)
}

/// Tier 2: parse the first fenced block that contains an object.
pub fn parse_fenced(text: &str) -> Option<JsonObject> {
    let pattern = FENCED_OBJECT.as_ref()?;
    let interior = pattern.captures(text)?.get(1)?.as_str();

    parse_object(&escape_control_chars(interior)).or_else(|| parse_object(&repair(interior)))
}

/// Tier 3: repair the whole text and parse it.
pub fn parse_repaired(text: &str) -> Option<JsonObject> {
    parse_object(&repair(text))
}

/// Tier 4: try every balanced brace span, longest first.
pub fn parse_brace_candidates(text: &str) -> Option<JsonObject> {
    let mut candidates = brace_candidates(text);
    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));

    candidates.into_iter().find_map(|candidate| {
        parse_object(&escape_control_chars(candidate)).or_else(|| parse_object(&repair(candidate)))
    })
}

/// Spans between a depth 0→1 `{` and its matching depth 1→0 `}`.
///
/// Braces inside string literals are counted too; a stray `}` at depth
/// zero is ignored.
pub fn brace_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in text.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        candidates.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    candidates
}

/// Escape raw newline, carriage-return, tab and other control characters
/// that appear inside string literals.
pub fn escape_control_chars(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            c if c.is_control() => push_escaped_control(&mut out, c),
            c => out.push(c),
        }
    }

    out
}

/// Best-effort normalisation of a malformed object.
///
/// Drops text before the first `{` and after the object closes, escapes
/// control characters in strings, removes trailing commas, maps Python
/// literals (`True`, `False`, `None`) to JSON, closes an unterminated
/// string and appends missing closing brackets.
pub fn repair(text: &str) -> String {
    let Some(start) = text.find('{') else {
        return text.trim().to_string();
    };

    let chars: Vec<char> = text[start..].chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if c == '"' {
                in_string = false;
                out.push(c);
            } else if c.is_control() {
                push_escaped_control(&mut out, c);
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if closers.last() == Some(&c) {
                    closers.pop();
                    out.push(c);
                    if closers.is_empty() {
                        break;
                    }
                }
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            c if c.is_ascii_alphabetic() => {
                let end = chars[i..]
                    .iter()
                    .position(|n| !n.is_ascii_alphanumeric() && *n != '_')
                    .map_or(chars.len(), |p| i + p);
                let word: String = chars[i..end].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
                i = end;
                continue;
            }
            c => out.push(c),
        }
        i += 1;
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    if !closers.is_empty() {
        let trimmed = out.trim_end().trim_end_matches(',').trim_end().len();
        out.truncate(trimmed);
        if out.ends_with(':') {
            out.push_str("null");
        }
        while let Some(closer) = closers.pop() {
            out.push(closer);
        }
    }

    out
}

fn push_escaped_control(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c => out.push_str(&format!("\\u{:04x}", c as u32)),
    }
}

fn parse_object(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}
