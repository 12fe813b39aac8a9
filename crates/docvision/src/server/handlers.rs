//! HTTP request handlers for the three services.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::info;

use super::error::ApiError;
use super::{validate, AppState};
use docvision_core::{
    ClassificationRequest, ClassificationResponse, MatchRequest, MatchResponse, ParsingRequest,
    ParsingResponse,
};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    provider: String,
    version: &'static str,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: state.service.name(),
        provider: state.analyzer.provider_name().to_string(),
        version: docvision_core::VERSION,
    })
}

/// `POST /classify`
pub async fn classify(
    State(state): State<AppState>,
    payload: Result<Json<ClassificationRequest>, JsonRejection>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let Json(request) = payload?;
    validate::classification(&request)?;
    info!(
        documents = request.documents.len(),
        "Classification request"
    );

    let analyzer = state.analyzer.clone();
    let results = tokio::spawn(async move {
        analyzer
            .classify_all(request.documents, &request.criteria)
            .await
    })
    .await?;

    Ok(Json(ClassificationResponse { results }))
}

/// `POST /parse`
pub async fn parse(
    State(state): State<AppState>,
    payload: Result<Json<ParsingRequest>, JsonRejection>,
) -> Result<Json<ParsingResponse>, ApiError> {
    let Json(request) = payload?;
    validate::parsing(&request)?;
    info!(documents = request.documents.len(), "Parsing request");

    let analyzer = state.analyzer.clone();
    let parsed_results = tokio::spawn(async move {
        analyzer.parse_all(request.documents, &request.schema).await
    })
    .await?;

    Ok(Json(ParsingResponse { parsed_results }))
}

/// `POST /match`
///
/// Pairs `documents_a[i]` with `documents_b[i]`, or checks every document in
/// `documents_a` against `comparison_values` when no second set is given.
pub async fn match_documents(
    State(state): State<AppState>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchResponse>, ApiError> {
    let Json(request) = payload?;
    validate::matching(&request)?;

    let analyzer = state.analyzer.clone();
    let MatchRequest {
        documents_a,
        documents_b,
        criteria,
        comparison_values,
    } = request;

    let match_results = match documents_b {
        Some(documents_b) => {
            info!(pairs = documents_a.len(), "Document matching request");
            let criteria = criteria.unwrap_or_default();
            tokio::spawn(async move {
                analyzer
                    .match_pairs(documents_a, documents_b, &criteria)
                    .await
            })
            .await?
        }
        None => {
            let values = comparison_values.unwrap_or_default();
            info!(
                documents = documents_a.len(),
                values = values.len(),
                "Value matching request"
            );
            tokio::spawn(async move {
                analyzer
                    .match_values_all(documents_a, values, criteria.as_deref())
                    .await
            })
            .await?
        }
    };

    Ok(Json(MatchResponse { match_results }))
}
