//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::llm::KNOWN_PROVIDERS;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.parallel == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.parallel must be > 0".into(),
            ));
        }
        if self.analysis.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.timeout_ms must be > 0".into(),
            ));
        }
        if self.analysis.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_tokens must be > 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(ConfigError::ValidationError(
                "analysis.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.server.body_limit_mb == 0 {
            return Err(ConfigError::ValidationError(
                "server.body_limit_mb must be > 0".into(),
            ));
        }
        let ports = [
            self.server.classification_port,
            self.server.parsing_port,
            self.server.matching_port,
        ];
        if ports.contains(&0) {
            return Err(ConfigError::ValidationError(
                "server ports must be > 0".into(),
            ));
        }
        if ports[0] == ports[1] || ports[0] == ports[2] || ports[1] == ports[2] {
            return Err(ConfigError::ValidationError(
                "server ports must be distinct".into(),
            ));
        }
        if !KNOWN_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "llm.provider must be one of {}, got '{}'",
                KNOWN_PROVIDERS.join(", "),
                self.llm.provider
            )));
        }
        Ok(())
    }
}
