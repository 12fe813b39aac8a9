//! What to do after a failed LLM attempt.
//!
//! The analyzer asks [`next_action`] after every failure. Output problems
//! are repaired by re-prompting, transport hiccups are backed off, and
//! everything else ends the attempt loop.

use crate::error::AnalysisError;
use std::time::Duration;

/// Backoff ceiling.
const MAX_BACKOFF_MS: u64 = 30_000;

/// The analyzer's next step after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Re-prompt at once with a repair hint describing the bad reply
    Repair,
    /// Resend the same prompt after waiting
    Backoff(Duration),
    /// Stop and report the error
    GiveUp,
}

/// Decide how to follow up on `error` from attempt number `attempt` (0-based).
pub fn next_action(error: &AnalysisError, attempt: u32, base_delay_ms: u64) -> RetryAction {
    if error.is_output_problem() {
        RetryAction::Repair
    } else if is_retryable(error) {
        RetryAction::Backoff(backoff_duration(attempt, base_delay_ms))
    } else {
        RetryAction::GiveUp
    }
}

/// Whether a transport-level failure is worth resending unchanged.
///
/// Output problems are not covered here; they need a different prompt,
/// not the same one again.
pub fn is_retryable(error: &AnalysisError) -> bool {
    match error {
        AnalysisError::Timeout { .. } | AnalysisError::Connection { .. } => true,
        // 408 request timeout, 429 rate limit, 5xx provider trouble
        AnalysisError::Llm {
            status_code: Some(code),
            ..
        } => *code == 408 || *code == 429 || (500..=599).contains(code),
        // Unknown provider, missing key, undecodable body
        AnalysisError::Llm {
            status_code: None, ..
        } => false,
        AnalysisError::InvalidDocument { .. } | AnalysisError::Unsupported { .. } => false,
        AnalysisError::EmptyResponse | AnalysisError::MalformedResponse(_) => false,
    }
}

/// Exponential backoff: `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

/// Map a failed `send()` into an [`AnalysisError`].
///
/// Connect and timeout failures become [`AnalysisError::Connection`] so they
/// are retried; anything else (bad URL, redirect loop, body encoding) is a
/// plain LLM error.
pub(crate) fn send_error(provider: &str, error: reqwest::Error) -> AnalysisError {
    if error.is_connect() || error.is_timeout() {
        AnalysisError::Connection {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    } else {
        AnalysisError::Llm {
            message: format!("{provider} request failed: {error}"),
            status_code: error.status().map(|s| s.as_u16()),
        }
    }
}
