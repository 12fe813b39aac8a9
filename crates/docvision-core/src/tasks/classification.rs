//! Decoding classification replies.

use crate::error::{AnalysisError, AnalysisResult};
use crate::extract::normalize::{non_empty_string, normalize_confidence};
use crate::types::{AlternativeClassification, ClassificationResult};
use serde_json::Value;

const LABEL_KEYS: &[&str] = &["classification", "label", "category", "class"];

/// Build a [`ClassificationResult`] from the model's JSON object.
///
/// A missing or blank primary label is a malformed reply. Alternatives
/// without a label, or repeating the primary label, are dropped; the rest
/// are sorted by confidence, highest first.
pub fn decode(value: &Value, document_id: &str) -> AnalysisResult<ClassificationResult> {
    let classification = label_of(value).ok_or_else(|| {
        AnalysisError::MalformedResponse("reply has no \"classification\" label".to_string())
    })?;

    let confidence_score = value
        .get("confidence")
        .or_else(|| value.get("confidence_score"))
        .and_then(normalize_confidence)
        .unwrap_or(0.0);

    let raw_alternatives = value
        .get("alternatives")
        .or_else(|| value.get("alternative_classifications"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut alternative_classifications: Vec<AlternativeClassification> = raw_alternatives
        .iter()
        .filter_map(decode_alternative)
        .filter(|alt| !alt.label.eq_ignore_ascii_case(&classification))
        .collect();
    alternative_classifications.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut seen: Vec<String> = Vec::new();
    alternative_classifications.retain(|alt| {
        let label = alt.label.to_lowercase();
        if seen.contains(&label) {
            false
        } else {
            seen.push(label);
            true
        }
    });

    Ok(ClassificationResult {
        document_id: document_id.to_string(),
        classification,
        confidence_score,
        reasoning: non_empty_string(value.get("reasoning")),
        alternative_classifications,
        error: None,
    })
}

fn label_of(value: &Value) -> Option<String> {
    LABEL_KEYS
        .iter()
        .find_map(|key| non_empty_string(value.get(*key)))
}

fn decode_alternative(item: &Value) -> Option<AlternativeClassification> {
    match item {
        Value::String(label) if !label.trim().is_empty() => Some(AlternativeClassification {
            label: label.trim().to_string(),
            confidence: 0.0,
            reasoning: None,
        }),
        Value::Object(_) => Some(AlternativeClassification {
            label: label_of(item).or_else(|| non_empty_string(item.get("name")))?,
            confidence: item
                .get("confidence")
                .and_then(normalize_confidence)
                .unwrap_or(0.0),
            reasoning: non_empty_string(item.get("reasoning")),
        }),
        _ => None,
    }
}
