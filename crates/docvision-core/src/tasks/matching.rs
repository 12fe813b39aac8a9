//! Decoding document comparison replies.

use crate::error::{AnalysisError, AnalysisResult};
use crate::extract::normalize::{
    coerce_value, non_empty_string, normalize_confidence, normalize_key, status_from_value,
};
use crate::types::{ComparisonValue, MatchResult, MatchStatus, MatchedField};
use serde_json::Value;
use std::collections::BTreeMap;

/// Build a [`MatchResult`] from the model's JSON object.
///
/// Field statuses are normalized; a field without a status is judged by
/// comparing its two values. A missing `overall_status` is derived from the
/// fields and a missing overall confidence is their mean. A reply with
/// neither fields nor an overall status is malformed.
pub fn decode(
    value: &Value,
    document_id_a: &str,
    document_id_b: Option<&str>,
) -> AnalysisResult<MatchResult> {
    let matched_fields = decode_fields(value)?;
    let reported_status = value.get("overall_status").and_then(status_from_value);

    if matched_fields.is_empty() && reported_status.is_none() {
        return Err(AnalysisError::MalformedResponse(
            "reply has neither \"matched_fields\" nor \"overall_status\"".to_string(),
        ));
    }

    let overall_status = reported_status.unwrap_or_else(|| derive_overall(&matched_fields));
    let confidence = value
        .get("confidence")
        .and_then(normalize_confidence)
        .unwrap_or_else(|| mean_confidence(&matched_fields));

    Ok(MatchResult {
        document_id_a: document_id_a.to_string(),
        document_id_b: document_id_b.map(String::from),
        matched_fields,
        overall_status,
        confidence,
        reason: non_empty_string(value.get("reason").or_else(|| value.get("reasoning")))
            .unwrap_or_default(),
        error: None,
    })
}

/// Decode a value-comparison reply and reconcile it with the caller's values.
///
/// `value_b` always carries the caller's expected value. Expected fields the
/// model skipped are reported as mismatches, and an overall `match` is
/// downgraded to `partial_match` when that happens.
pub fn decode_against_values(
    value: &Value,
    document_id_a: &str,
    values: &[ComparisonValue],
) -> AnalysisResult<MatchResult> {
    let mut result = decode(value, document_id_a, None)?;
    let mut missing = false;

    for expected in values {
        let key = normalize_key(&expected.field);
        if key.is_empty() {
            continue;
        }
        match result.matched_fields.get_mut(&key) {
            Some(field) => field.value_b = expected.value.trim().to_string(),
            None => {
                missing = true;
                result.matched_fields.insert(
                    key,
                    MatchedField {
                        value_a: String::new(),
                        value_b: expected.value.trim().to_string(),
                        status: MatchStatus::Mismatch,
                        confidence: 0.0,
                        reason: "Field was not reported by the model".to_string(),
                        delta: None,
                    },
                );
            }
        }
    }

    if missing && result.overall_status == MatchStatus::Match {
        result.overall_status = MatchStatus::PartialMatch;
    }
    Ok(result)
}

fn decode_fields(value: &Value) -> AnalysisResult<BTreeMap<String, MatchedField>> {
    let raw = value.get("matched_fields").or_else(|| value.get("fields"));
    let mut fields = BTreeMap::new();

    match raw {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, entry) in map {
                let key = normalize_key(name);
                if !key.is_empty() {
                    fields.insert(key, decode_field(entry));
                }
            }
        }
        // [{"field": "total", ...}, ...]
        Some(Value::Array(items)) => {
            for entry in items {
                let name = ["field", "name", "key"]
                    .iter()
                    .find_map(|k| non_empty_string(entry.get(*k)));
                if let Some(key) = name.map(|n| normalize_key(&n)).filter(|k| !k.is_empty()) {
                    fields.insert(key, decode_field(entry));
                }
            }
        }
        Some(_) => {
            return Err(AnalysisError::MalformedResponse(
                "\"matched_fields\" is not an object".to_string(),
            ))
        }
    }

    Ok(fields)
}

fn decode_field(entry: &Value) -> MatchedField {
    if !entry.is_object() {
        // "total": "match"
        return MatchedField {
            value_a: String::new(),
            value_b: String::new(),
            status: status_from_value(entry).unwrap_or(MatchStatus::Mismatch),
            confidence: 0.0,
            reason: String::new(),
            delta: None,
        };
    }

    let value_a = entry.get("value_a").map(coerce_value).unwrap_or_default();
    let value_b = entry.get("value_b").map(coerce_value).unwrap_or_default();
    let status = entry
        .get("status")
        .and_then(status_from_value)
        .unwrap_or_else(|| compare_values(&value_a, &value_b));

    MatchedField {
        status,
        confidence: entry
            .get("confidence")
            .and_then(normalize_confidence)
            .unwrap_or(0.0),
        reason: non_empty_string(entry.get("reason").or_else(|| entry.get("reasoning")))
            .unwrap_or_default(),
        delta: entry
            .get("delta")
            .filter(|d| !d.is_null())
            .map(coerce_value)
            .filter(|d| !d.is_empty()),
        value_a,
        value_b,
    }
}

/// Case- and whitespace-insensitive comparison used when the model gave no status.
fn compare_values(a: &str, b: &str) -> MatchStatus {
    let squash = |s: &str| {
        s.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    };
    if !a.is_empty() && squash(a) == squash(b) {
        MatchStatus::Match
    } else {
        MatchStatus::Mismatch
    }
}

fn derive_overall(fields: &BTreeMap<String, MatchedField>) -> MatchStatus {
    if fields.is_empty() {
        return MatchStatus::Mismatch;
    }
    if fields.values().all(|f| f.status == MatchStatus::Match) {
        MatchStatus::Match
    } else if fields.values().all(|f| f.status == MatchStatus::Mismatch) {
        MatchStatus::Mismatch
    } else {
        MatchStatus::PartialMatch
    }
}

fn mean_confidence(fields: &BTreeMap<String, MatchedField>) -> f64 {
    if fields.is_empty() {
        return 0.0;
    }
    fields.values().map(|f| f.confidence).sum::<f64>() / fields.len() as f64
}
