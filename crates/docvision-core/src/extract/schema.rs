//! Best-effort field discovery in natural-language schemas.
//!
//! Callers describe what to extract in prose, e.g.
//!
//! ```text
//! - Invoice number: the number printed in the header
//! - Total amount (including VAT)
//! ```
//!
//! or `invoice number, date and total`. The field names found here are used
//! to steer the prompt and to reconcile the model's keys; an empty result
//! simply means the model's own keys are taken as-is. Free prose such as
//! "Extract invoice details" names no fields.

use super::normalize::normalize_key;
use serde_json::Value;

/// Longest phrase still treated as a field name rather than a sentence.
const MAX_NAME_WORDS: usize = 5;

/// Leading words that introduce a list rather than name a field.
const LEAD_WORDS: &[&str] = &[
    "extract", "get", "find", "return", "parse", "capture", "include", "the", "a", "an", "all",
    "these", "following", "fields", "field", "values", "please",
];

/// One-word line heads that introduce a remark, not a field (`Note: ...`).
const REMARK_HEADS: &[&str] = &[
    "note", "notes", "nb", "e.g", "eg", "i.e", "ie", "example", "examples", "format", "hint",
    "tip", "important", "remember", "context", "instructions", "warning", "ps",
];

/// Extract normalized field names from a natural-language schema.
///
/// Recognizes JSON objects and arrays, `name: description` lines, bullet and
/// numbered lists, and comma- or semicolon-separated lists. An unbulleted
/// line without a separator is prose and contributes nothing.
///
/// Duplicates are dropped. Lists, lines and JSON arrays keep the caller's
/// order; JSON object keys come back sorted, since `serde_json::Map` is a
/// `BTreeMap` here.
pub fn expected_fields(schema: &str) -> Vec<String> {
    let trimmed = schema.trim();
    let mut fields = FieldSet::default();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        collect_json_names(&value, &mut fields);
        if !fields.is_empty() {
            return fields.into_vec();
        }
    }

    for raw in trimmed.lines().filter(|l| !l.trim().is_empty()) {
        let (line, bulleted) = strip_bullet(raw.trim());
        if line.is_empty() {
            continue;
        }

        if let Some((head, tail)) = line.split_once(':') {
            let name = clean_name(head);
            if name.is_empty() {
                // "Extract these fields: a, b, c"
                push_list(tail, &mut fields);
            } else if is_name_like(&name) && !is_remark_head(&name) {
                fields.push(&name);
            }
            continue;
        }

        if line.contains(',') || line.contains(';') {
            push_list(line, &mut fields);
        } else if bulleted {
            let name = clean_name(line);
            if is_name_like(&name) {
                fields.push(&name);
            }
        }
    }

    fields.into_vec()
}

fn collect_json_names(value: &Value, fields: &mut FieldSet) {
    match value {
        Value::Object(map) => {
            for key in map.keys() {
                fields.push(key);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => fields.push(name),
                    Value::Object(obj) => {
                        if let Some(name) = ["name", "field", "key"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(Value::as_str))
                        {
                            fields.push(name);
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn push_list(text: &str, fields: &mut FieldSet) {
    let mut parts: Vec<&str> = text.split([',', ';']).collect();
    // "a, b and c" -> the last piece holds two names
    if let Some(last) = parts.pop() {
        parts.extend(last.split(" and "));
    }
    for part in parts {
        let name = clean_name(part);
        if is_name_like(&name) {
            fields.push(&name);
        }
    }
}

/// Remove list markers: `-`, `*`, `•`, `1.`, `2)`.
fn strip_bullet(line: &str) -> (&str, bool) {
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return (rest.trim(), true);
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return (rest.trim(), true);
        }
    }
    (line, false)
}

/// Strip parentheticals, quoting, trailing punctuation and lead-in words.
fn clean_name(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '"' | '\'' | '`' | '*' => {}
            _ if depth == 0 => text.push(c),
            _ => {}
        }
    }

    let words: Vec<&str> = text
        .trim()
        .trim_end_matches(['.', '?', '!'])
        .split_whitespace()
        .collect();
    let start = words
        .iter()
        .position(|w| !LEAD_WORDS.contains(&w.to_ascii_lowercase().as_str()))
        .unwrap_or(words.len());
    words[start..].join(" ")
}

fn is_remark_head(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !lower.contains(' ') && REMARK_HEADS.contains(&lower.as_str())
}

fn is_name_like(name: &str) -> bool {
    let words = name.split_whitespace().count();
    (1..=MAX_NAME_WORDS).contains(&words) && name.chars().any(char::is_alphanumeric)
}

/// Ordered set of normalized field names.
#[derive(Default)]
struct FieldSet(Vec<String>);

impl FieldSet {
    fn push(&mut self, name: &str) {
        let key = normalize_key(name);
        if !key.is_empty() && !self.0.contains(&key) {
            self.0.push(key);
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_vec(self) -> Vec<String> {
        self.0
    }
}
