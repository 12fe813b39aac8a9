//! Coercion of loosely-typed model output into the wire types.

use crate::types::MatchStatus;
use serde_json::Value;

/// Convert a model-reported confidence into a score in `[0, 1]`.
///
/// Accepts fractions, percentages (numbers above 1 or strings ending in `%`),
/// numeric strings and the words high/medium/low. Negative or non-numeric
/// values yield `None`.
pub fn normalize_confidence(value: &Value) -> Option<f64> {
    let (raw, percent) = match value {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(number) => (number.trim().parse::<f64>().ok()?, true),
                None => match s.parse::<f64>() {
                    Ok(n) => (n, false),
                    Err(_) => (confidence_word(s)?, false),
                },
            }
        }
        _ => return None,
    };

    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let score = if percent || raw > 1.0 { raw / 100.0 } else { raw };
    Some(score.clamp(0.0, 1.0))
}

fn confidence_word(word: &str) -> Option<f64> {
    match word.to_ascii_lowercase().as_str() {
        "very high" | "certain" => Some(0.95),
        "high" => Some(0.9),
        "medium" | "moderate" => Some(0.6),
        "low" => Some(0.3),
        "very low" => Some(0.1),
        _ => None,
    }
}

/// Normalize a field name to snake_case.
///
/// `"Invoice Number"`, `"invoice-number"` and `"invoiceNumber"` all become
/// `"invoice_number"`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_lower_or_digit = false;

    for c in key.trim().chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower_or_digit && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = c.is_lowercase() || c.is_numeric();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower_or_digit = false;
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Render any JSON value as the string the frontend displays.
pub fn coerce_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Map the many ways a model spells a comparison outcome onto [`MatchStatus`].
pub fn normalize_status(raw: &str) -> MatchStatus {
    let status = normalize_key(raw);
    if status.starts_with("partial") {
        return MatchStatus::PartialMatch;
    }
    match status.as_str() {
        "match" | "matched" | "matches" | "matching" | "same" | "equal" | "identical"
        | "true" | "yes" | "ok" | "consistent" => MatchStatus::Match,
        _ => MatchStatus::Mismatch,
    }
}

/// Read a status from a JSON value, accepting strings and booleans.
pub fn status_from_value(value: &Value) -> Option<MatchStatus> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(normalize_status(s)),
        Value::Bool(true) => Some(MatchStatus::Match),
        Value::Bool(false) => Some(MatchStatus::Mismatch),
        _ => None,
    }
}

/// Read an optional trimmed, non-empty string.
pub(crate) fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
