//! Prompt templates for the three tasks.
//!
//! Every template spells out the exact JSON shape expected back and forbids
//! text outside the object; the decoders in [`crate::tasks`] are still
//! lenient because models do not always comply.

use crate::types::ComparisonValue;

/// System instruction sent with every request.
pub const SYSTEM_PROMPT: &str = "You are a document analysis assistant. \
Always respond in valid JSON format according to the specified schema.";

const JSON_ONLY: &str =
    "Do not include any other text or explanation outside of this JSON object.";

/// Prompt for classifying a single document.
pub fn classification(criteria: &str) -> String {
    format!(
        r#"Analyze this document based on these criteria: {criteria}

You must respond with ONLY a JSON object in this exact format:
{{
    "classification": "primary classification",
    "confidence": 0.95,
    "reasoning": "explanation of classification",
    "alternatives": [
        {{
            "label": "alternative classification",
            "confidence": 0.45,
            "reasoning": "explanation"
        }}
    ]
}}

Confidence values are numbers between 0 and 1.
{JSON_ONLY}"#,
        criteria = criteria.trim(),
    )
}

/// Prompt for extracting fields from a single document.
///
/// When field names could be discovered in the schema they are listed
/// explicitly so the model uses the same keys.
pub fn parsing(schema: &str, expected_fields: &[String]) -> String {
    let key_hint = if expected_fields.is_empty() {
        "Use short snake_case field names.".to_string()
    } else {
        format!(
            "Use exactly these field names: {}. Use an empty string for fields that are not present.",
            expected_fields.join(", ")
        )
    };

    format!(
        r#"Extract information from this document based on this schema: {schema}

{key_hint}

You must respond with ONLY a JSON object in this exact format:
{{
    "fields": {{
        "fieldName": "extracted value"
    }},
    "confidence": {{
        "fieldName": 0.95
    }},
    "reasoning": {{
        "fieldName": "explanation of extraction"
    }}
}}

Field values are strings. Confidence values are numbers between 0 and 1.
{JSON_ONLY}"#,
        schema = schema.trim(),
    )
}

/// Prompt for comparing two documents (attached in order A, B).
pub fn matching(criteria: &str, document_id_a: &str, document_id_b: &str) -> String {
    format!(
        r#"Compare the two attached documents and identify matches and differences based on these criteria: {criteria}

The first attachment is Document A ({document_id_a}); the second is Document B ({document_id_b}).

You must respond with ONLY a JSON object in this exact format:
{{
    "matched_fields": {{
        "fieldName": {{
            "value_a": "value in document A",
            "value_b": "value in document B",
            "status": "match",
            "confidence": 0.95,
            "reason": "why the values match or differ",
            "delta": "difference, if any"
        }}
    }},
    "overall_status": "match",
    "confidence": 0.9,
    "reason": "summary of the comparison"
}}

"status" is one of "match", "partial_match" or "mismatch". "overall_status" is one of "match", "partial_match" or "mismatch".
{JSON_ONLY}"#,
        criteria = criteria.trim(),
    )
}

/// Prompt for checking one document against caller-supplied expected values.
pub fn value_comparison(values: &[ComparisonValue], criteria: Option<&str>) -> String {
    let expected = values
        .iter()
        .map(|v| format!("- {}: {}", v.field.trim(), v.value.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let criteria = criteria
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("\nAdditional criteria: {c}\n"))
        .unwrap_or_default();

    format!(
        r#"Check whether the attached document agrees with these expected values:
{expected}
{criteria}
For each expected field, report the value found in the document as "value_a" and the expected value as "value_b".

You must respond with ONLY a JSON object in this exact format:
{{
    "matched_fields": {{
        "fieldName": {{
            "value_a": "value in the document",
            "value_b": "expected value",
            "status": "match",
            "confidence": 0.95,
            "reason": "why the values match or differ",
            "delta": "difference, if any"
        }}
    }},
    "overall_status": "match",
    "confidence": 0.9,
    "reason": "summary of the comparison"
}}

"status" is one of "match", "partial_match" or "mismatch". "overall_status" is one of "match", "partial_match" or "mismatch".
{JSON_ONLY}"#
    )
}

/// Note appended to a prompt when the previous reply was unusable.
pub fn repair_hint(problem: &str) -> String {
    format!(
        "\n\nYour previous reply could not be used: {problem}. \
         Respond again with ONLY the JSON object described above."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_embeds_criteria_and_shape() {
        let prompt = classification("  invoice, receipt or contract  ");
        assert!(prompt.starts_with("Analyze this document based on these criteria: invoice, receipt or contract\n"));
        assert!(prompt.contains(r#""alternatives": ["#));
        assert!(prompt.contains(JSON_ONLY));
    }

    #[test]
    fn test_parsing_lists_expected_fields() {
        let fields = vec!["invoice_number".to_string(), "total".to_string()];
        let prompt = parsing("invoice number and total", &fields);
        assert!(prompt.contains("Use exactly these field names: invoice_number, total."));
        assert!(prompt.contains(r#""fields": {"#));
    }

    #[test]
    fn test_parsing_without_fields_asks_for_snake_case() {
        let prompt = parsing("anything useful", &[]);
        assert!(prompt.contains("snake_case"));
        assert!(!prompt.contains("Use exactly these field names"));
    }

    #[test]
    fn test_matching_names_both_documents() {
        let prompt = matching("totals and dates", "po-1.pdf", "inv-1.pdf");
        assert!(prompt.contains("Document A (po-1.pdf)"));
        assert!(prompt.contains("Document B (inv-1.pdf)"));
        assert!(prompt.contains("totals and dates"));
    }

    #[test]
    fn test_value_comparison_lists_values() {
        let values = vec![
            ComparisonValue {
                field: "Total".to_string(),
                value: "120.00".to_string(),
            },
            ComparisonValue {
                field: "Vendor".to_string(),
                value: "ACME".to_string(),
            },
        ];
        let prompt = value_comparison(&values, Some("ignore currency symbols"));
        assert!(prompt.contains("- Total: 120.00\n- Vendor: ACME"));
        assert!(prompt.contains("Additional criteria: ignore currency symbols"));

        let prompt = value_comparison(&values, Some("   "));
        assert!(!prompt.contains("Additional criteria"));
    }

    #[test]
    fn test_repair_hint() {
        let hint = repair_hint("no JSON object found");
        assert!(hint.contains("no JSON object found"));
        assert!(hint.contains("ONLY the JSON object"));
    }
}
