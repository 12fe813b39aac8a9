//! Locating a JSON object inside free-form model output.
//!
//! Models are told to answer with bare JSON but routinely wrap it in
//! markdown fences or a sentence of preamble. Candidates are tried from the
//! most to the least specific:
//!
//! 1. the whole (trimmed) reply
//! 2. the body of each fenced code block
//! 3. each balanced `{...}` span, scanning left to right
//! 4. the greedy span from the first `{` to the last `}`

use serde_json::Value;

/// Extract the first JSON object from an LLM reply.
///
/// Returns `None` when no candidate parses to a JSON object; arrays and
/// scalars are rejected because every task expects an object at the root.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    for block in fenced_blocks(trimmed) {
        if let Some(value) = parse_object(block) {
            return Some(value);
        }
    }

    let bytes = trimmed.as_bytes();
    for (start, _) in trimmed.match_indices('{') {
        if let Some(end) = balanced_end(bytes, start) {
            if let Some(value) = parse_object(&trimmed[start..=end]) {
                return Some(value);
            }
        }
    }

    let first = trimmed.find('{')?;
    let last = trimmed.rfind('}')?;
    if last > first {
        parse_object(&trimmed[first..=last])
    } else {
        None
    }
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Bodies of ``` fenced blocks, with any language tag line removed.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let Some(close) = after_open.find("```") else {
            break;
        };
        let body = &after_open[..close];
        // Drop a language tag such as `json` on the opening line
        let body = match body.split_once('\n') {
            Some((tag, tail)) if !tag.trim_start().starts_with('{') => tail,
            _ => body,
        };
        blocks.push(body);
        rest = &after_open[close + 3..];
    }
    blocks
}

/// Index of the `}` closing the object that opens at `start`.
///
/// Braces inside string literals are ignored.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}
