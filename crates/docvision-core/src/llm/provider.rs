//! LLM provider trait and request/response types.
//!
//! Defines the interface that all LLM providers implement, plus the
//! factory that creates the right provider from config and CLI flags.

use crate::config::LlmConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{Document, DocumentKind};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

/// Provider identifiers accepted by [`LlmProviderFactory::create`].
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic", "ollama"];

/// Base64-encoded document ready to send to an LLM API.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Base64-encoded bytes
    pub data: String,
    /// MIME type (e.g., "image/png", "application/pdf")
    pub media_type: String,
}

impl Attachment {
    /// Build an attachment from a submitted document.
    ///
    /// Accepts either a `data:` URL or bare base64. The payload is decoded to
    /// validate it and to sniff the real media type from magic bytes; when
    /// that is inconclusive the declared document kind decides.
    pub fn from_document(document: &Document) -> AnalysisResult<Self> {
        let invalid = |message: &str| AnalysisError::InvalidDocument {
            document_id: document.document_id.clone(),
            message: message.to_string(),
        };

        let content = document.content.trim();
        let (declared, payload) = match content.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| invalid("data URL has no payload"))?;
                let media_type = header
                    .strip_suffix(";base64")
                    .ok_or_else(|| invalid("data URL is not base64-encoded"))?;
                let declared = (!media_type.is_empty()).then(|| media_type.to_string());
                (declared, payload)
            }
            None => (None, content),
        };

        let data: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(invalid("content is empty"));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&data)
            .map_err(|e| invalid(&format!("content is not valid base64: {e}")))?;

        let media_type = sniff_media_type(&bytes)
            .map(String::from)
            .or(declared)
            .unwrap_or_else(|| match document.kind {
                DocumentKind::Pdf => "application/pdf".to_string(),
                DocumentKind::Image => "image/jpeg".to_string(),
            });

        Ok(Self { data, media_type })
    }

    /// Whether this attachment is a PDF rather than an image.
    pub fn is_pdf(&self) -> bool {
        self.media_type == "application/pdf"
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Identify common document formats from their leading bytes.
fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [b'%', b'P', b'D', b'F', ..] => Some("application/pdf"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// A request to analyze one or more documents.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// System instruction, if the provider supports one
    pub system: Option<String>,
    /// Text prompt for the model
    pub prompt: String,
    /// Documents shown to the model, in order
    pub attachments: Vec<Attachment>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object
    pub json_response: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            attachments,
            max_tokens: 4096,
            temperature: 0.1,
            json_response: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// The response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn LlmProvider>` shared across request handlers).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "anthropic", "ollama").
    fn name(&self) -> &str;

    /// Check whether the provider is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Run a completion for the given request.
    ///
    /// Providers return the raw text; an empty reply is returned as-is so the
    /// analyzer can treat it as an output problem and retry.
    async fn generate(&self, request: &LlmRequest) -> AnalysisResult<LlmResponse>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the appropriate provider from config and CLI flags.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an LLM provider based on provider name, config, and optional model override.
    ///
    /// # Arguments
    /// * `provider` - Provider identifier ("openai", "anthropic", "ollama")
    /// * `config` - The full LLM config section
    /// * `model_override` - Optional model name that overrides the config default
    pub fn create(
        provider: &str,
        config: &LlmConfig,
        model_override: Option<&str>,
    ) -> AnalysisResult<Box<dyn LlmProvider>> {
        match provider {
            "openai" => {
                let cfg = config.openai.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| AnalysisError::Llm {
                    message: "OpenAI API key not set. Set OPENAI_API_KEY env var.".to_string(),
                    status_code: None,
                })?;
                let model = model_override.map(String::from).unwrap_or(cfg.model);
                Ok(Box::new(
                    super::openai::OpenAiProvider::with_endpoint(&api_key, &model, &cfg.endpoint)
                        .with_detail(&cfg.detail),
                ))
            }
            "anthropic" => {
                let cfg = config.anthropic.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| AnalysisError::Llm {
                    message: "Anthropic API key not set. Set ANTHROPIC_API_KEY env var."
                        .to_string(),
                    status_code: None,
                })?;
                let model = model_override.map(String::from).unwrap_or(cfg.model);
                Ok(Box::new(super::anthropic::AnthropicProvider::new(
                    &api_key, &model,
                )))
            }
            "ollama" => {
                let cfg = config.ollama.clone().unwrap_or_default();
                let model = model_override.map(String::from).unwrap_or(cfg.model);
                Ok(Box::new(super::ollama::OllamaProvider::new(
                    &cfg.endpoint,
                    &model,
                )))
            }
            other => Err(AnalysisError::Llm {
                message: format!("Unknown LLM provider: {other}"),
                status_code: None,
            }),
        }
    }
}
