//! Lenient JSON extraction from model output.
//!
//! Small local models wrap their JSON in prose, code fences, or
//! reasoning tags, and routinely truncate or leave trailing commas.
//! This module digs the payload out and repairs what it can. It never
//! fails: unusable output degrades to an empty object and the caller's
//! fallback semantics take over.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Extract a JSON value from raw model output, repairing common damage.
pub fn parse_lenient(text: &str) -> Value {
    let cleaned = strip_thinking(text);
    let cleaned = cleaned.replace("```json", "").replace("```", "");

    let candidate = match locate_json(&cleaned) {
        Some(candidate) => balance(candidate),
        None => {
            tracing::error!("No JSON payload found in model output");
            return Value::Object(Default::default());
        }
    };

    if let Ok(value) = serde_json::from_str(&candidate) {
        return value;
    }

    // One repair attempt: trailing commas before a closer.
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let trailing_comma = TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*([}\]])").unwrap());
    let repaired = trailing_comma.replace_all(&candidate, "$1");

    match serde_json::from_str(&repaired) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Model output unparseable after repair");
            Value::Object(Default::default())
        }
    }
}

/// Remove `<think>...</think>` blocks. An unclosed block swallows the
/// rest of the string, which is correct: truncated reasoning never
/// contains the payload.
fn strip_thinking(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("<think>") {
        out.push_str(&rest[..open]);
        match rest[open..].find("</think>") {
            Some(close) => rest = &rest[open + close + "</think>".len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Slice out the outermost JSON payload.
///
/// Starts at the first `{` or `[` (whichever comes first) and ends at
/// the last matching closer. With no closer after the opener (truncated
/// output) the slice runs to the end of the string; `balance` supplies
/// the missing closers.
fn locate_json(text: &str) -> Option<&str> {
    let obj = text.find('{');
    let arr = text.find('[');
    let (open, closer) = match (obj, arr) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return None,
    };

    match text.rfind(closer) {
        Some(end) if end > open => Some(&text[open..=end]),
        _ => Some(&text[open..]),
    }
}

/// Append whatever closers an (assumed truncated) payload is missing.
fn balance(candidate: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in candidate.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = candidate.trim_end().to_string();
    // Truncation mid-pair leaves a dangling comma that would make the
    // appended closer invalid.
    if out.ends_with(',') {
        out.pop();
    }
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
