//! LLM integration for document analysis.
//!
//! Provides a provider abstraction over multiple vision-capable backends
//! (OpenAI, Anthropic, Ollama) plus retry classification and backoff.

pub(crate) mod anthropic;
pub(crate) mod ollama;
pub(crate) mod openai;
pub mod provider;
pub mod retry;

pub use provider::{
    Attachment, LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse, KNOWN_PROVIDERS,
};
