//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// HTTP server settings shared by the three services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port for the classification service
    pub classification_port: u16,

    /// Port for the parsing service
    pub parsing_port: u16,

    /// Port for the matching service
    pub matching_port: u16,

    /// Maximum JSON request body in megabytes (base64 documents are large)
    pub body_limit_mb: usize,

    /// Allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            classification_port: 3001,
            parsing_port: 3002,
            matching_port: 3003,
            body_limit_mb: 50,
            cors: true,
        }
    }
}

/// Analysis settings: retries, timeouts and generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Documents analyzed concurrently per request
    pub parallel: usize,

    /// Extra attempts after the first on failed or unusable output
    pub max_retries: u32,

    /// Base backoff delay for transport retries in milliseconds
    pub retry_delay_ms: u64,

    /// Per-call LLM timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum tokens the model may generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Ask providers that support it for a JSON-only response
    pub json_response: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parallel: 4,
            max_retries: 2,
            retry_delay_ms: 500,
            timeout_ms: 60_000,
            max_tokens: 4096,
            temperature: 0.1,
            json_response: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// LLM provider configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Active provider: "openai", "anthropic" or "ollama"
    pub provider: String,

    /// OpenAI (or OpenAI-compatible) configuration
    pub openai: Option<OpenAiConfig>,

    /// Anthropic configuration
    pub anthropic: Option<AnthropicConfig>,

    /// Ollama (local) configuration
    pub ollama: Option<OllamaConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            openai: None,
            anthropic: None,
            ollama: None,
        }
    }
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Chat Completions endpoint
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,

    /// Image detail level: "low", "high" or "auto"
    pub detail: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o".to_string(),
            detail: "high".to_string(),
        }
    }
}

/// Anthropic configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: "${ANTHROPIC_API_KEY}".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama API endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2-vision".to_string(),
        }
    }
}
