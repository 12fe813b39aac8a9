//! The analysis engine: prompt, call, extract, decode, retry.
//!
//! Every task goes through [`Analyzer::run`], which owns the retry policy:
//!
//! - transport failures are retried with exponential backoff when
//!   [`retry::next_action`] says so, and end the loop otherwise
//! - empty or malformed replies are retried immediately with a repair hint
//!   appended to the prompt
//!
//! The `*_all` methods fan a request's documents out over
//! [`batch::run_ordered`] and turn per-document failures into fallback
//! results, so one bad document never fails a whole request.

use crate::batch;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::extract::{expected_fields, extract_json_object};
use crate::llm::retry::{self, RetryAction};
use crate::llm::{Attachment, LlmProvider, LlmRequest};
use crate::prompt;
use crate::tasks::{classification, matching, parsing};
use crate::types::{
    ClassificationResult, ComparisonValue, Document, MatchResult, ParsedResult,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tuning for the analysis engine.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Documents analyzed concurrently per request
    pub parallel: usize,
    /// Extra attempts after the first
    pub max_retries: u32,
    /// Base backoff delay for transport retries in milliseconds
    pub retry_delay_ms: u64,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask the provider for JSON-only output
    pub json_response: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for AnalyzeOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            parallel: config.parallel,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            timeout_ms: config.timeout_ms,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            json_response: config.json_response,
        }
    }
}

/// Runs document analysis tasks against an LLM provider.
///
/// Cheap to clone; clones share the provider.
#[derive(Clone)]
pub struct Analyzer {
    provider: Arc<dyn LlmProvider>,
    options: AnalyzeOptions,
}

impl Analyzer {
    pub fn new(provider: Box<dyn LlmProvider>, options: AnalyzeOptions) -> Self {
        Self {
            provider: Arc::from(provider),
            options,
        }
    }

    /// Name of the underlying provider, for logs and health output.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.options
    }

    /// Whether the provider is configured and reachable.
    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    /// Build a request carrying the shared system prompt and generation settings.
    fn request(&self, prompt: String, attachments: Vec<Attachment>) -> LlmRequest {
        LlmRequest {
            system: Some(prompt::SYSTEM_PROMPT.to_string()),
            prompt,
            attachments,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            json_response: self.options.json_response,
        }
    }

    /// Call the model until `decode` accepts its reply or attempts run out.
    ///
    /// Makes at most `1 + max_retries` calls and returns the last error when
    /// none succeeds.
    pub async fn run<T, F>(&self, mut request: LlmRequest, decode: F) -> AnalysisResult<T>
    where
        F: Fn(&Value) -> AnalysisResult<T> + Send + Sync,
    {
        let attempts = self.options.max_retries.saturating_add(1);
        let base_prompt = request.prompt.clone();
        let mut last_error = AnalysisError::EmptyResponse;

        for attempt in 0..attempts {
            let error = match self.attempt(&request, &decode).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(
                            provider = self.provider.name(),
                            "Succeeded on attempt {}/{attempts}",
                            attempt + 1
                        );
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            let retries_left = attempt + 1 < attempts;
            match retry::next_action(&error, attempt, self.options.retry_delay_ms) {
                RetryAction::Repair => {
                    tracing::warn!(
                        provider = self.provider.name(),
                        "Unusable LLM reply (attempt {}/{attempts}): {error}",
                        attempt + 1
                    );
                    request.prompt =
                        format!("{base_prompt}{}", prompt::repair_hint(&error.to_string()));
                }
                RetryAction::Backoff(delay) => {
                    tracing::warn!(
                        provider = self.provider.name(),
                        "Transient LLM failure (attempt {}/{attempts}): {error}",
                        attempt + 1
                    );
                    if retries_left {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryAction::GiveUp => return Err(error),
            }
            last_error = error;
        }

        Err(last_error)
    }

    async fn attempt<T, F>(&self, request: &LlmRequest, decode: &F) -> AnalysisResult<T>
    where
        F: Fn(&Value) -> AnalysisResult<T> + Send + Sync,
    {
        // The provider's own ceiling wins when it is tighter
        let limit = Duration::from_millis(self.options.timeout_ms).min(self.provider.timeout());
        let response = match tokio::time::timeout(limit, self.provider.generate(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AnalysisError::Timeout {
                    stage: "llm".to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        };

        tracing::debug!(
            model = %response.model,
            latency_ms = response.latency_ms,
            tokens = ?response.tokens_used,
            "LLM reply received"
        );

        if response.text.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        let value = extract_json_object(&response.text).ok_or_else(|| {
            AnalysisError::MalformedResponse("no JSON object found in the reply".to_string())
        })?;
        decode(&value)
    }

    // === Single-document tasks ===

    /// Classify one document against natural-language criteria.
    pub async fn classify(
        &self,
        document: &Document,
        criteria: &str,
    ) -> AnalysisResult<ClassificationResult> {
        let attachment = Attachment::from_document(document)?;
        let request = self.request(prompt::classification(criteria), vec![attachment]);
        self.run(request, |value| {
            classification::decode(value, &document.document_id)
        })
        .await
    }

    /// Extract the fields described by `schema` from one document.
    pub async fn parse(&self, document: &Document, schema: &str) -> AnalysisResult<ParsedResult> {
        let fields = expected_fields(schema);
        let attachment = Attachment::from_document(document)?;
        let request = self.request(prompt::parsing(schema, &fields), vec![attachment]);
        self.run(request, |value| {
            parsing::decode(value, &document.document_id, &fields)
        })
        .await
    }

    /// Compare two documents field by field.
    pub async fn match_pair(
        &self,
        document_a: &Document,
        document_b: &Document,
        criteria: &str,
    ) -> AnalysisResult<MatchResult> {
        let attachments = vec![
            Attachment::from_document(document_a)?,
            Attachment::from_document(document_b)?,
        ];
        let request = self.request(
            prompt::matching(criteria, &document_a.document_id, &document_b.document_id),
            attachments,
        );
        self.run(request, |value| {
            matching::decode(
                value,
                &document_a.document_id,
                Some(&document_b.document_id),
            )
        })
        .await
    }

    /// Check one document against caller-supplied expected values.
    pub async fn match_values(
        &self,
        document: &Document,
        values: &[ComparisonValue],
        criteria: Option<&str>,
    ) -> AnalysisResult<MatchResult> {
        let attachment = Attachment::from_document(document)?;
        let request = self.request(prompt::value_comparison(values, criteria), vec![attachment]);
        self.run(request, |value| {
            matching::decode_against_values(value, &document.document_id, values)
        })
        .await
    }

    // === Batch entry points used by the services ===

    /// Classify every document, falling back per document on failure.
    pub async fn classify_all(
        &self,
        documents: Vec<Document>,
        criteria: &str,
    ) -> Vec<ClassificationResult> {
        let ids: Vec<String> = documents.iter().map(|d| d.document_id.clone()).collect();
        let criteria: Arc<str> = Arc::from(criteria);
        let results = batch::run_ordered(documents, self.options.parallel, |document| {
            let analyzer = self.clone();
            let criteria = criteria.clone();
            async move {
                analyzer
                    .classify(&document, &criteria)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        ids.iter()
            .zip(results)
            .map(|(id, result)| match result.and_then(|r| r) {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!(document_id = %id, "Classification failed: {error}");
                    ClassificationResult::failed(id, error)
                }
            })
            .collect()
    }

    /// Parse every document, falling back per document on failure.
    pub async fn parse_all(&self, documents: Vec<Document>, schema: &str) -> Vec<ParsedResult> {
        let ids: Vec<String> = documents.iter().map(|d| d.document_id.clone()).collect();
        let schema: Arc<str> = Arc::from(schema);
        let results = batch::run_ordered(documents, self.options.parallel, |document| {
            let analyzer = self.clone();
            let schema = schema.clone();
            async move {
                analyzer
                    .parse(&document, &schema)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        ids.iter()
            .zip(results)
            .map(|(id, result)| match result.and_then(|r| r) {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!(document_id = %id, "Parsing failed: {error}");
                    ParsedResult::failed(id, error)
                }
            })
            .collect()
    }

    /// Compare `documents_a[i]` with `documents_b[i]` for every index.
    ///
    /// Extra documents on the longer side are ignored; request validation
    /// rejects unequal lengths before this is reached.
    pub async fn match_pairs(
        &self,
        documents_a: Vec<Document>,
        documents_b: Vec<Document>,
        criteria: &str,
    ) -> Vec<MatchResult> {
        let pairs: Vec<(Document, Document)> = documents_a.into_iter().zip(documents_b).collect();
        let ids: Vec<(String, String)> = pairs
            .iter()
            .map(|(a, b)| (a.document_id.clone(), b.document_id.clone()))
            .collect();
        let criteria: Arc<str> = Arc::from(criteria);
        let results = batch::run_ordered(pairs, self.options.parallel, |(a, b)| {
            let analyzer = self.clone();
            let criteria = criteria.clone();
            async move {
                analyzer
                    .match_pair(&a, &b, &criteria)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        ids.iter()
            .zip(results)
            .map(|((id_a, id_b), result)| match result.and_then(|r| r) {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!(document_id_a = %id_a, document_id_b = %id_b, "Matching failed: {error}");
                    MatchResult::failed(id_a, Some(id_b.as_str()), error)
                }
            })
            .collect()
    }

    /// Check every document against the same expected values.
    pub async fn match_values_all(
        &self,
        documents: Vec<Document>,
        values: Vec<ComparisonValue>,
        criteria: Option<&str>,
    ) -> Vec<MatchResult> {
        let ids: Vec<String> = documents.iter().map(|d| d.document_id.clone()).collect();
        let values: Arc<[ComparisonValue]> = Arc::from(values);
        let criteria: Option<Arc<str>> = criteria.map(Arc::from);
        let results = batch::run_ordered(documents, self.options.parallel, |document| {
            let analyzer = self.clone();
            let values = values.clone();
            let criteria = criteria.clone();
            async move {
                analyzer
                    .match_values(&document, &values, criteria.as_deref())
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        ids.iter()
            .zip(results)
            .map(|(id, result)| match result.and_then(|r| r) {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!(document_id = %id, "Value comparison failed: {error}");
                    MatchResult::failed(id, None, error)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use crate::types::{DocumentKind, MatchStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const PNG_B64: &str = "iVBORw0KGgo=";

    /// A scripted mock provider.
    ///
    /// Each call to `generate()` invokes the script with the call index,
    /// allowing tests to return different replies per attempt. Prompts are
    /// recorded for later assertions.
    struct MockProvider {
        script: Box<dyn Fn(u32) -> AnalysisResult<String> + Send + Sync>,
        call_count: Arc<AtomicU32>,
        prompts: Arc<Mutex<Vec<String>>>,
        delay: Option<Duration>,
    }

    impl MockProvider {
        fn scripted(
            script: impl Fn(u32) -> AnalysisResult<String> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                call_count: Arc::new(AtomicU32::new(0)),
                prompts: Arc::new(Mutex::new(Vec::new())),
                delay: None,
            }
        }

        fn replying(text: &str) -> Self {
            let text = text.to_string();
            Self::scripted(move |_| Ok(text.clone()))
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate(&self, request: &LlmRequest) -> AnalysisResult<LlmResponse> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let text = (self.script)(idx)?;
            Ok(LlmResponse {
                text,
                model: "mock-v1".to_string(),
                tokens_used: Some(42),
                latency_ms: 5,
            })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(60)
        }
    }

    fn fast_options() -> AnalyzeOptions {
        AnalyzeOptions {
            parallel: 4,
            max_retries: 2,
            retry_delay_ms: 1,
            timeout_ms: 5000,
            ..AnalyzeOptions::default()
        }
    }

    fn analyzer(provider: MockProvider) -> (Analyzer, Arc<AtomicU32>, Arc<Mutex<Vec<String>>>) {
        let calls = provider.call_count.clone();
        let prompts = provider.prompts.clone();
        (
            Analyzer::new(Box::new(provider), fast_options()),
            calls,
            prompts,
        )
    }

    fn document(id: &str) -> Document {
        Document {
            document_id: id.to_string(),
            content: PNG_B64.to_string(),
            kind: DocumentKind::Image,
        }
    }

    #[tokio::test]
    async fn test_classify_success() {
        let (analyzer, calls, prompts) = analyzer(MockProvider::replying(
            r#"Sure! {"classification": "invoice", "confidence": 0.9, "alternatives": []}"#,
        ));
        let result = analyzer
            .classify(&document("a.png"), "invoice or receipt")
            .await
            .unwrap();
        assert_eq!(result.document_id, "a.png");
        assert_eq!(result.classification, "invoice");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(prompts.lock().unwrap()[0].contains("invoice or receipt"));
    }

    #[tokio::test]
    async fn test_retries_malformed_output_with_repair_hint() {
        let provider = MockProvider::scripted(|idx| match idx {
            0 => Ok("I think this is an invoice.".to_string()),
            _ => Ok(r#"{"classification": "invoice"}"#.to_string()),
        });
        let (analyzer, calls, prompts) = analyzer(provider);
        let result = analyzer.classify(&document("a"), "type").await.unwrap();

        assert_eq!(result.classification, "invoice");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let prompts = prompts.lock().unwrap();
        assert!(!prompts[0].contains("previous reply"));
        assert!(prompts[1].contains("previous reply could not be used"));
        assert!(prompts[1].starts_with(&prompts[0]));
    }

    #[tokio::test]
    async fn test_retries_empty_output() {
        let provider = MockProvider::scripted(|idx| match idx {
            0 => Err(AnalysisError::EmptyResponse),
            1 => Ok("   ".to_string()),
            _ => Ok(r#"{"fields": {"total": "9"}}"#.to_string()),
        });
        let (analyzer, calls, _) = analyzer(provider);
        let result = analyzer.parse(&document("a"), "total").await.unwrap();
        assert_eq!(result.extracted_fields["total"], "9");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_two_retries() {
        let (analyzer, calls, _) = analyzer(MockProvider::replying("no idea"));
        let err = analyzer.classify(&document("a"), "type").await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = MockProvider::scripted(|idx| match idx {
            0 => Err(AnalysisError::Llm {
                message: "HTTP 503".to_string(),
                status_code: Some(503),
            }),
            _ => Ok(r#"{"classification": "receipt"}"#.to_string()),
        });
        let (analyzer, calls, prompts) = analyzer(provider);
        let result = analyzer.classify(&document("a"), "type").await.unwrap();
        assert_eq!(result.classification, "receipt");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Transport retries resend the original prompt
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_retries_unreachable_provider() {
        let provider = MockProvider::scripted(|idx| match idx {
            0 | 1 => Err(AnalysisError::Connection {
                provider: "mock".to_string(),
                message: "error sending request for url (http://127.0.0.1:1/)".to_string(),
            }),
            _ => Ok(r#"{"classification": "receipt"}"#.to_string()),
        });
        let (analyzer, calls, _) = analyzer(provider);
        let result = analyzer.classify(&document("a"), "type").await.unwrap();
        assert_eq!(result.classification, "receipt");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_auth_error() {
        let provider = MockProvider::scripted(|_| {
            Err(AnalysisError::Llm {
                message: "HTTP 401: unauthorized".to_string(),
                status_code: Some(401),
            })
        });
        let (analyzer, calls, _) = analyzer(provider);
        let err = analyzer.classify(&document("a"), "type").await.unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_reported() {
        let provider = MockProvider::replying(r#"{"classification": "slow"}"#)
            .with_delay(Duration::from_secs(5));
        let calls = provider.call_count.clone();
        let analyzer = Analyzer::new(
            Box::new(provider),
            AnalyzeOptions {
                timeout_ms: 20,
                max_retries: 1,
                ..fast_options()
            },
        );
        let err = analyzer.classify(&document("a"), "type").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_document_never_reaches_provider() {
        let (analyzer, calls, _) = analyzer(MockProvider::replying("{}"));
        let mut doc = document("broken");
        doc.content = "%%%".to_string();
        let err = analyzer.classify(&doc, "type").await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidDocument { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parse_uses_schema_fields() {
        let (analyzer, _, prompts) = analyzer(MockProvider::replying(
            r#"{"fields": {"Invoice Number": "INV-9"}, "confidence": {"Invoice Number": 0.8}}"#,
        ));
        let result = analyzer
            .parse(&document("a"), "invoice number, total")
            .await
            .unwrap();
        assert_eq!(result.extracted_fields["invoice_number"], "INV-9");
        assert_eq!(result.extracted_fields["total"], "");
        assert_eq!(result.confidence["invoice_number"], 0.8);
        assert!(prompts.lock().unwrap()[0].contains("invoice_number, total"));
    }

    #[tokio::test]
    async fn test_match_pair_sends_both_documents() {
        struct CountingProvider;

        #[async_trait]
        impl LlmProvider for CountingProvider {
            fn name(&self) -> &str {
                "counting"
            }
            async fn is_available(&self) -> bool {
                true
            }
            async fn generate(&self, request: &LlmRequest) -> AnalysisResult<LlmResponse> {
                assert_eq!(request.attachments.len(), 2);
                assert!(request.system.is_some());
                Ok(LlmResponse {
                    text: r#"{"matched_fields": {"total": {"value_a": "1", "value_b": "1", "status": "match"}}}"#
                        .to_string(),
                    model: "counting".to_string(),
                    tokens_used: None,
                    latency_ms: 0,
                })
            }
            fn timeout(&self) -> Duration {
                Duration::from_secs(1)
            }
        }

        let analyzer = Analyzer::new(Box::new(CountingProvider), fast_options());
        let result = analyzer
            .match_pair(&document("a"), &document("b"), "totals")
            .await
            .unwrap();
        assert_eq!(result.overall_status, MatchStatus::Match);
        assert_eq!(result.document_id_b.as_deref(), Some("b"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_classify_all_keeps_order_and_falls_back() {
        let (analyzer, _, _) = analyzer(MockProvider::replying(
            r#"{"classification": "invoice", "confidence": 0.7}"#,
        ));
        let mut bad = document("bad");
        bad.content = String::new();
        let docs = vec![document("one"), bad, document("three")];

        let results = analyzer.classify_all(docs, "type").await;
        let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["one", "bad", "three"]);
        assert_eq!(results[0].classification, "invoice");
        assert_eq!(results[1].classification, "Error");
        assert_eq!(results[1].confidence_score, 0.0);
        assert!(results[1].error.as_deref().unwrap().contains("empty"));
        assert!(results[2].error.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parse_all_fallback_after_retries() {
        let (analyzer, calls, _) = analyzer(MockProvider::replying("nothing to see"));
        let results = analyzer.parse_all(vec![document("x")], "total").await;
        assert_eq!(results.len(), 1);
        assert!(results[0].extracted_fields.is_empty());
        assert!(results[0].error.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_match_pairs_and_values() {
        let (analyzer, _, _) = analyzer(MockProvider::replying(
            r#"{"matched_fields": {"total": {"value_a": "10", "value_b": "12", "status": "mismatch"}}, "overall_status": "mismatch"}"#,
        ));
        let results = analyzer
            .match_pairs(
                vec![document("a1"), document("a2")],
                vec![document("b1"), document("b2")],
                "totals",
            )
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].document_id_a, "a2");
        assert_eq!(results[1].document_id_b.as_deref(), Some("b2"));
        assert_eq!(results[0].overall_status, MatchStatus::Mismatch);

        let values = vec![ComparisonValue {
            field: "total".to_string(),
            value: "11".to_string(),
        }];
        let results = analyzer
            .match_values_all(vec![document("a1")], values, None)
            .await;
        assert_eq!(results[0].matched_fields["total"].value_b, "11");
        assert!(results[0].document_id_b.is_none());
    }
}
