//! Request and response types shared by the three services.
//!
//! Field names follow the JSON contract the frontend already speaks, so these
//! structs serialize without renames except where noted.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A document submitted for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Caller-chosen identifier, echoed back in results
    pub document_id: String,

    /// Base64 payload or a `data:` URL
    pub content: String,

    /// Whether the payload is a PDF or an image
    #[serde(rename = "type", default)]
    pub kind: DocumentKind,
}

/// Coarse document type used to choose a MIME type when none can be sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    #[default]
    Image,
}

impl<'de> Deserialize<'de> for DocumentKind {
    // Clients send things like "png" or "image/jpeg" here; anything that
    // isn't a PDF is treated as an image.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.to_ascii_lowercase().contains("pdf") {
            Ok(DocumentKind::Pdf)
        } else {
            Ok(DocumentKind::Image)
        }
    }
}

// === Classification ===

/// Body of `POST /classify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub criteria: String,
}

/// A runner-up label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeClassification {
    pub label: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Classification outcome for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub document_id: String,
    pub classification: String,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub alternative_classifications: Vec<AlternativeClassification>,
    /// Set when analysis failed and this is a fallback result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationResult {
    /// Fallback returned when every attempt failed.
    pub fn failed(document_id: &str, error: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            classification: "Error".to_string(),
            confidence_score: 0.0,
            reasoning: None,
            alternative_classifications: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Body returned by `POST /classify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub results: Vec<ClassificationResult>,
}

// === Parsing ===

/// Body of `POST /parse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingRequest {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub schema: String,
}

/// Extracted fields for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedResult {
    pub document_id: String,
    pub extracted_fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub confidence: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParsedResult {
    /// Fallback returned when every attempt failed.
    pub fn failed(document_id: &str, error: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            extracted_fields: BTreeMap::new(),
            confidence: BTreeMap::new(),
            error: Some(error.into()),
        }
    }
}

/// Body returned by `POST /parse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingResponse {
    pub parsed_results: Vec<ParsedResult>,
}

// === Matching ===

/// An expected value to compare a document against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonValue {
    pub field: String,
    pub value: String,
}

/// Body of `POST /match`.
///
/// Either `documents_b` (pairwise, by index) or `comparison_values` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub documents_a: Vec<Document>,
    #[serde(default)]
    pub documents_b: Option<Vec<Document>>,
    #[serde(default)]
    pub criteria: Option<String>,
    #[serde(default)]
    pub comparison_values: Option<Vec<ComparisonValue>>,
}

/// Per-field and overall comparison status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Match,
    PartialMatch,
    Mismatch,
}

/// Comparison of one field across two sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedField {
    pub value_a: String,
    pub value_b: String,
    pub status: MatchStatus,
    pub confidence: f64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

/// Comparison outcome for one document (pair).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub document_id_a: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id_b: Option<String>,
    pub matched_fields: BTreeMap<String, MatchedField>,
    pub overall_status: MatchStatus,
    pub confidence: f64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MatchResult {
    /// Fallback returned when every attempt failed.
    pub fn failed(document_id_a: &str, document_id_b: Option<&str>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            document_id_a: document_id_a.to_string(),
            document_id_b: document_id_b.map(String::from),
            matched_fields: BTreeMap::new(),
            overall_status: MatchStatus::Mismatch,
            confidence: 0.0,
            reason: "Comparison failed".to_string(),
            error: Some(error),
        }
    }
}

/// Body returned by `POST /match`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub match_results: Vec<MatchResult>,
}
