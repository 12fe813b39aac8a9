//! Docvision Core - document analysis through vision LLMs.
//!
//! Docvision sends document images and PDFs to a vision-capable LLM and turns
//! its free-form replies into validated, typed results for three tasks:
//! classification, field extraction (parsing), and document matching.
//!
//! # Architecture
//!
//! ```text
//! Document → Attachment → Prompt → LLM → Extract JSON → Normalize → Result
//!                                   ↑                        │
//!                                   └──── retry (≤ 2) ───────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use docvision_core::{Config, Docvision, Document};
//!
//! #[tokio::main]
//! async fn main() -> docvision_core::Result<()> {
//!     let config = Config::load()?;
//!     let docvision = Docvision::new(config, None)?;
//!
//!     let results = docvision
//!         .analyzer()
//!         .classify_all(documents, "invoice, receipt or contract")
//!         .await;
//!     println!("{results:?}");
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod analyzer;
pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod tasks;
pub mod types;

// Re-exports for convenient access
pub use analyzer::{AnalyzeOptions, Analyzer};
pub use config::Config;
pub use error::{AnalysisError, AnalysisResult, ConfigError, DocvisionError, Result};
pub use llm::{LlmProvider, LlmProviderFactory};
pub use types::{
    ClassificationRequest, ClassificationResponse, ClassificationResult, ComparisonValue,
    Document, DocumentKind, MatchRequest, MatchResponse, MatchResult, MatchStatus, MatchedField,
    ParsedResult, ParsingRequest, ParsingResponse,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Docvision instance - configuration plus a ready analyzer.
pub struct Docvision {
    config: Config,
    analyzer: Analyzer,
}

impl Docvision {
    /// Build the configured LLM provider and an analyzer around it.
    ///
    /// Fails when the provider is unknown or its API key cannot be resolved.
    pub fn new(config: Config, model_override: Option<&str>) -> Result<Self> {
        let provider =
            LlmProviderFactory::create(&config.llm.provider, &config.llm, model_override)?;
        tracing::debug!(
            "Initializing docvision v{} with provider {}",
            VERSION,
            provider.name()
        );
        let analyzer = Analyzer::new(provider, AnalyzeOptions::from(&config.analysis));
        Ok(Self { config, analyzer })
    }

    /// Use an already constructed provider, e.g. one built by the caller.
    pub fn with_provider(config: Config, provider: Box<dyn LlmProvider>) -> Self {
        let analyzer = Analyzer::new(provider, AnalyzeOptions::from(&config.analysis));
        Self { config, analyzer }
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }
}
