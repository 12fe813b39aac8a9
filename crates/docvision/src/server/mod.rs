//! HTTP layer: one axum router per service.
//!
//! Each service exposes its POST endpoint plus `GET /health`. Services can
//! run on their own ports or side by side in one process.

mod error;
mod handlers;
mod validate;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use docvision_core::config::ServerConfig;
use docvision_core::Analyzer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The three document services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Classification,
    Parsing,
    Matching,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Classification, Service::Parsing, Service::Matching];

    pub fn name(self) -> &'static str {
        match self {
            Service::Classification => "classification",
            Service::Parsing => "parsing",
            Service::Matching => "matching",
        }
    }

    /// Path of the service's POST endpoint.
    pub fn route(self) -> &'static str {
        match self {
            Service::Classification => "/classify",
            Service::Parsing => "/parse",
            Service::Matching => "/match",
        }
    }

    pub fn port(self, config: &ServerConfig) -> u16 {
        match self {
            Service::Classification => config.classification_port,
            Service::Parsing => config.parsing_port,
            Service::Matching => config.matching_port,
        }
    }
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Service,
    pub analyzer: Analyzer,
}

/// Build the router for one service.
pub fn build_router(service: Service, analyzer: Analyzer, config: &ServerConfig) -> Router {
    let endpoint = match service {
        Service::Classification => post(handlers::classify),
        Service::Parsing => post(handlers::parse),
        Service::Matching => post(handlers::match_documents),
    };

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route(service.route(), endpoint)
        .layer(DefaultBodyLimit::max(config.body_limit_mb * 1024 * 1024))
        .layer(TraceLayer::new_for_http());

    let router = if config.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(AppState { service, analyzer })
}

/// Bind `addr` and serve one service until Ctrl-C.
pub async fn start(
    service: Service,
    addr: &str,
    analyzer: Analyzer,
    config: &ServerConfig,
) -> Result<(), std::io::Error> {
    let app = build_router(service, analyzer, config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "{} service listening on {} (POST {})",
        service.name(),
        listener.local_addr()?,
        service.route()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use docvision_core::llm::{LlmRequest, LlmResponse};
    use docvision_core::{AnalysisResult, AnalyzeOptions, LlmProvider};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const PNG_B64: &str = "iVBORw0KGgo=";

    /// Replies with the same text for every call.
    struct FixedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate(&self, _request: &LlmRequest) -> AnalysisResult<LlmResponse> {
            Ok(LlmResponse {
                text: self.0.to_string(),
                model: "fixed".to_string(),
                tokens_used: None,
                latency_ms: 1,
            })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn router(service: Service, reply: &'static str) -> Router {
        let options = AnalyzeOptions {
            retry_delay_ms: 1,
            ..AnalyzeOptions::default()
        };
        let analyzer = Analyzer::new(Box::new(FixedProvider(reply)), options);
        build_router(service, analyzer, &ServerConfig::default())
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn document(id: &str) -> Value {
        json!({"document_id": id, "content": PNG_B64, "type": "image/png"})
    }

    #[test]
    fn test_service_routes_and_ports() {
        let config = ServerConfig::default();
        assert_eq!(Service::Classification.port(&config), 3001);
        assert_eq!(Service::Parsing.port(&config), 3002);
        assert_eq!(Service::Matching.port(&config), 3003);
        assert_eq!(Service::Matching.route(), "/match");
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(Service::Parsing, "{}"), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "parsing");
        assert_eq!(body["provider"], "fixed");
    }

    #[tokio::test]
    async fn test_classify_endpoint() {
        let app = router(
            Service::Classification,
            r#"```json
{"classification": "invoice", "confidence": "high", "alternatives": [{"label": "receipt", "confidence": 0.2}]}
```"#,
        );
        let body = json!({"documents": [document("a"), document("b")], "criteria": "invoice or receipt"});
        let (status, body) = send(app, "POST", "/classify", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["document_id"], "b");
        assert_eq!(results[0]["classification"], "invoice");
        assert_eq!(results[0]["confidence_score"], 0.9);
        assert_eq!(results[0]["alternative_classifications"][0]["label"], "receipt");
    }

    #[tokio::test]
    async fn test_classify_fallback_keeps_status_ok() {
        let app = router(Service::Classification, "I cannot tell.");
        let body = json!({"documents": [document("a")], "criteria": "type"});
        let (status, body) = send(app, "POST", "/classify", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["classification"], "Error");
        assert_eq!(body["results"][0]["confidence_score"], 0.0);
        assert!(body["results"][0]["error"].is_string());
    }

    #[tokio::test]
    async fn test_classify_validation() {
        let app = router(Service::Classification, "{}");
        let body = json!({"documents": [], "criteria": ""});
        let (status, body) = send(app, "POST", "/classify", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["field"], "documents");
    }

    #[tokio::test]
    async fn test_malformed_json_body() {
        let app = router(Service::Parsing, "{}");
        let request = Request::builder()
            .method("POST")
            .uri("/parse")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let config = ServerConfig {
            body_limit_mb: 1,
            ..ServerConfig::default()
        };
        let analyzer = Analyzer::new(Box::new(FixedProvider("{}")), AnalyzeOptions::default());
        let app = build_router(Service::Parsing, analyzer, &config);

        let content = "A".repeat(2 * 1024 * 1024);
        let body = json!({"documents": [{"document_id": "big", "content": content}], "schema": "total"});
        let (status, body) = send(app, "POST", "/parse", Some(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_unsupported_media_type() {
        let app = router(Service::Classification, "{}");
        let request = Request::builder()
            .method("POST")
            .uri("/classify")
            .body(Body::from(r#"{"documents": [], "criteria": "x"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_parse_endpoint() {
        let app = router(
            Service::Parsing,
            r#"{"fields": {"Invoice Number": "INV-7", "total": 12.5}, "confidence": {"total": 0.8}}"#,
        );
        let body = json!({"documents": [document("inv")], "schema": "invoice number, total, due date"});
        let (status, body) = send(app, "POST", "/parse", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let result = &body["parsed_results"][0];
        assert_eq!(result["document_id"], "inv");
        assert_eq!(result["extracted_fields"]["invoice_number"], "INV-7");
        assert_eq!(result["extracted_fields"]["total"], "12.5");
        assert_eq!(result["extracted_fields"]["due_date"], "");
        assert_eq!(result["confidence"]["total"], 0.8);
    }

    #[tokio::test]
    async fn test_match_pairs_endpoint() {
        let app = router(
            Service::Matching,
            r#"{"matched_fields": {"total": {"value_a": "10", "value_b": "10", "status": "match", "confidence": 0.9}}, "overall_status": "match", "confidence": 0.9, "reason": "same"}"#,
        );
        let body = json!({
            "documents_a": [document("po")],
            "documents_b": [document("inv")],
            "criteria": "compare totals"
        });
        let (status, body) = send(app, "POST", "/match", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let result = &body["match_results"][0];
        assert_eq!(result["document_id_a"], "po");
        assert_eq!(result["document_id_b"], "inv");
        assert_eq!(result["overall_status"], "match");
        assert_eq!(result["matched_fields"]["total"]["status"], "match");
    }

    #[tokio::test]
    async fn test_match_values_endpoint() {
        let app = router(
            Service::Matching,
            r#"{"matched_fields": {"total": {"value_a": "10", "value_b": "10", "status": "match"}}, "overall_status": "match"}"#,
        );
        let body = json!({
            "documents_a": [document("scan")],
            "comparison_values": [{"field": "total", "value": "10"}, {"field": "vendor", "value": "ACME"}]
        });
        let (status, body) = send(app, "POST", "/match", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let result = &body["match_results"][0];
        assert!(result.get("document_id_b").is_none());
        assert_eq!(result["overall_status"], "partial_match");
        assert_eq!(result["matched_fields"]["vendor"]["status"], "mismatch");
    }

    #[tokio::test]
    async fn test_match_length_mismatch() {
        let app = router(Service::Matching, "{}");
        let body = json!({
            "documents_a": [document("a1"), document("a2")],
            "documents_b": [document("b1")],
            "criteria": "totals"
        });
        let (status, body) = send(app, "POST", "/match", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "documents_b");
    }

    #[tokio::test]
    async fn test_wrong_route_is_not_found() {
        let app = router(Service::Parsing, "{}");
        let request = Request::builder()
            .method("POST")
            .uri("/classify")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
