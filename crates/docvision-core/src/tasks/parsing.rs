//! Decoding field-extraction replies.

use crate::error::{AnalysisError, AnalysisResult};
use crate::extract::normalize::{coerce_value, normalize_confidence, normalize_key};
use crate::types::ParsedResult;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys that sit next to `fields` and are never fields themselves.
const ENVELOPE_KEYS: &[&str] = &["fields", "confidence", "reasoning"];

/// Build a [`ParsedResult`] from the model's JSON object.
///
/// Accepts the requested `{fields, confidence}` envelope or a flat object of
/// fields. Keys are normalized to snake_case and reconciled with
/// `expected_fields`; expected fields the model left out are filled with an
/// empty value and zero confidence. A reply with no fields at all is
/// malformed when `expected_fields` is non-empty, and an empty result
/// otherwise.
pub fn decode(
    value: &Value,
    document_id: &str,
    expected_fields: &[String],
) -> AnalysisResult<ParsedResult> {
    let flat;
    let fields = match value.get("fields") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(AnalysisError::MalformedResponse(
                "\"fields\" is not an object".to_string(),
            ))
        }
        None => {
            flat = flat_fields(value);
            &flat
        }
    };

    let confidences: BTreeMap<String, f64> = value
        .get("confidence")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| Some((normalize_key(k), normalize_confidence(v)?)))
                .collect()
        })
        .unwrap_or_default();

    let mut extracted_fields = BTreeMap::new();
    let mut confidence = BTreeMap::new();

    for (raw_key, raw_value) in fields {
        let key = reconcile_key(&normalize_key(raw_key), expected_fields);
        if key.is_empty() {
            continue;
        }

        // Some models nest {"value": ..., "confidence": ...} per field
        let (field_value, inline_confidence) = match raw_value {
            Value::Object(inner) if inner.contains_key("value") => (
                coerce_value(&inner["value"]),
                inner.get("confidence").and_then(normalize_confidence),
            ),
            other => (coerce_value(other), None),
        };

        let score = inline_confidence
            .or_else(|| confidences.get(&key).copied())
            .or_else(|| confidences.get(&normalize_key(raw_key)).copied());
        if let Some(score) = score {
            confidence.insert(key.clone(), score);
        }
        extracted_fields.insert(key, field_value);
    }

    // Nothing to extract is a valid answer when the schema named no fields
    if extracted_fields.is_empty() && !expected_fields.is_empty() {
        return Err(AnalysisError::MalformedResponse(
            "reply contains no extracted fields".to_string(),
        ));
    }

    for expected in expected_fields {
        if !extracted_fields.contains_key(expected) {
            extracted_fields.insert(expected.clone(), String::new());
            confidence.insert(expected.clone(), 0.0);
        }
    }

    Ok(ParsedResult {
        document_id: document_id.to_string(),
        extracted_fields,
        confidence,
        error: None,
    })
}

fn flat_fields(value: &Value) -> Map<String, Value> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Map a normalized key onto an expected field name when they differ only
/// in separators (`invoicenumber` vs `invoice_number`).
fn reconcile_key(key: &str, expected_fields: &[String]) -> String {
    if expected_fields.iter().any(|f| f == key) {
        return key.to_string();
    }
    let compact = key.replace('_', "");
    expected_fields
        .iter()
        .find(|f| f.replace('_', "") == compact)
        .cloned()
        .unwrap_or_else(|| key.to_string())
}
