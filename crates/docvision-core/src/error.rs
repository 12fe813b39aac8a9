//! Error types for docvision.
//!
//! Errors are split by concern: configuration problems surface at startup,
//! analysis errors surface per document and feed the retry classifier.

use thiserror::Error;

/// Top-level error type for docvision operations.
#[derive(Error, Debug)]
pub enum DocvisionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document analysis errors
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while analyzing a single document (or document pair).
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The LLM call failed at the transport or API level
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },

    /// The request never reached the provider or got no response in time
    #[error("{provider} unreachable: {message}")]
    Connection { provider: String, message: String },

    /// The LLM call exceeded its deadline
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// The model answered with nothing usable
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// The model answered, but not with the JSON shape we asked for
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    /// The document payload could not be turned into an attachment
    #[error("Invalid document {document_id}: {message}")]
    InvalidDocument {
        document_id: String,
        message: String,
    },

    /// The provider cannot handle this kind of input
    #[error("{provider} does not support {what}")]
    Unsupported { provider: String, what: String },
}

impl AnalysisError {
    /// Whether the failure came from the model's output rather than the transport.
    ///
    /// Output failures are retried with a repair hint appended to the prompt.
    pub fn is_output_problem(&self) -> bool {
        matches!(
            self,
            AnalysisError::EmptyResponse | AnalysisError::MalformedResponse(_)
        )
    }
}

/// Convenience type alias for docvision results.
pub type Result<T> = std::result::Result<T, DocvisionError>;

/// Convenience type alias for analysis-specific results.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
