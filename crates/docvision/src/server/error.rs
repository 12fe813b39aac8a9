//! HTTP error envelope.
//!
//! Validation failures become `400 {"errors": [{field, message}]}`; anything
//! unexpected becomes `500 {"error": "Internal server error", "details"}`.
//! Bodies that are too large (413) or not JSON at all (415) keep their
//! status but use the validation envelope.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request ({} errors)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("unreadable body ({status}): {message}")]
    Body { status: StatusCode, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    errors: &'a [FieldError],
}

#[derive(Serialize)]
struct InternalBody<'a> {
    error: &'static str,
    details: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation(errors) => {
                tracing::debug!("Rejected request: {errors:?}");
                (StatusCode::BAD_REQUEST, Json(ValidationBody { errors })).into_response()
            }
            ApiError::Body { status, message } => {
                tracing::debug!("Rejected body ({status}): {message}");
                let errors = [FieldError::new("body", message.as_str())];
                (*status, Json(ValidationBody { errors: &errors })).into_response()
            }
            ApiError::Internal(details) => {
                tracing::error!("Request failed: {details}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(InternalBody {
                        error: "Internal server error",
                        details,
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            status @ (StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE) => {
                ApiError::Body {
                    status,
                    message: rejection.body_text(),
                }
            }
            // Syntax and shape errors alike are the caller's bad request
            _ => ApiError::Validation(vec![FieldError::new("body", rejection.body_text())]),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("analysis task failed: {error}"))
    }
}
