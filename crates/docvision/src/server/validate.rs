//! Request shape checks run before any LLM call.

use super::error::{ApiError, FieldError};
use docvision_core::{ClassificationRequest, Document, MatchRequest, ParsingRequest};

pub fn classification(request: &ClassificationRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    check_documents("documents", &request.documents, &mut errors);
    check_text("criteria", &request.criteria, &mut errors);
    finish(errors)
}

pub fn parsing(request: &ParsingRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    check_documents("documents", &request.documents, &mut errors);
    check_text("schema", &request.schema, &mut errors);
    finish(errors)
}

/// Matching needs `documents_a` plus either an equally long `documents_b`
/// with criteria, or a non-empty `comparison_values` list.
pub fn matching(request: &MatchRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    check_documents("documents_a", &request.documents_a, &mut errors);

    match (&request.documents_b, &request.comparison_values) {
        (Some(documents_b), _) => {
            check_documents("documents_b", documents_b, &mut errors);
            if !documents_b.is_empty() && documents_b.len() != request.documents_a.len() {
                errors.push(FieldError::new(
                    "documents_b",
                    format!(
                        "must contain as many documents as documents_a ({} vs {})",
                        documents_b.len(),
                        request.documents_a.len()
                    ),
                ));
            }
            check_text(
                "criteria",
                request.criteria.as_deref().unwrap_or_default(),
                &mut errors,
            );
        }
        (None, Some(values)) => {
            if values.is_empty() {
                errors.push(FieldError::new("comparison_values", "must not be empty"));
            }
            for (i, value) in values.iter().enumerate() {
                if value.field.trim().is_empty() {
                    errors.push(FieldError::new(
                        format!("comparison_values[{i}].field"),
                        "is required",
                    ));
                }
            }
        }
        (None, None) => errors.push(FieldError::new(
            "documents_b",
            "either documents_b or comparison_values is required",
        )),
    }

    finish(errors)
}

fn check_documents(name: &str, documents: &[Document], errors: &mut Vec<FieldError>) {
    if documents.is_empty() {
        errors.push(FieldError::new(name, "at least one document is required"));
        return;
    }
    for (i, document) in documents.iter().enumerate() {
        if document.document_id.trim().is_empty() {
            errors.push(FieldError::new(
                format!("{name}[{i}].document_id"),
                "is required",
            ));
        }
        if document.content.trim().is_empty() {
            errors.push(FieldError::new(format!("{name}[{i}].content"), "is required"));
        }
    }
}

fn check_text(name: &str, value: &str, errors: &mut Vec<FieldError>) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(name, "is required"));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvision_core::{ComparisonValue, DocumentKind};

    fn doc(id: &str, content: &str) -> Document {
        Document {
            document_id: id.to_string(),
            content: content.to_string(),
            kind: DocumentKind::Image,
        }
    }

    fn fields(result: Result<(), ApiError>) -> Vec<String> {
        match result {
            Err(ApiError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_classification_valid() {
        let request = ClassificationRequest {
            documents: vec![doc("a", "abc")],
            criteria: "invoice or receipt".to_string(),
        };
        assert!(classification(&request).is_ok());
    }

    #[test]
    fn test_classification_collects_all_errors() {
        let request = ClassificationRequest {
            documents: vec![doc("", "abc"), doc("b", "  ")],
            criteria: " ".to_string(),
        };
        assert_eq!(
            fields(classification(&request)),
            vec!["documents[0].document_id", "documents[1].content", "criteria"]
        );
    }

    #[test]
    fn test_parsing_requires_documents_and_schema() {
        let request = ParsingRequest {
            documents: vec![],
            schema: String::new(),
        };
        assert_eq!(fields(parsing(&request)), vec!["documents", "schema"]);
    }

    #[test]
    fn test_matching_pairs() {
        let mut request = MatchRequest {
            documents_a: vec![doc("a", "x")],
            documents_b: Some(vec![doc("b", "y")]),
            criteria: Some("totals".to_string()),
            comparison_values: None,
        };
        assert!(matching(&request).is_ok());

        request.documents_b = Some(vec![doc("b", "y"), doc("c", "z")]);
        request.criteria = None;
        assert_eq!(fields(matching(&request)), vec!["documents_b", "criteria"]);
    }

    #[test]
    fn test_matching_values() {
        let mut request = MatchRequest {
            documents_a: vec![doc("a", "x")],
            documents_b: None,
            criteria: None,
            comparison_values: Some(vec![ComparisonValue {
                field: "total".to_string(),
                value: "10".to_string(),
            }]),
        };
        assert!(matching(&request).is_ok());

        request.comparison_values = Some(vec![]);
        assert_eq!(fields(matching(&request)), vec!["comparison_values"]);

        request.comparison_values = None;
        assert_eq!(fields(matching(&request)), vec!["documents_b"]);
    }
}
