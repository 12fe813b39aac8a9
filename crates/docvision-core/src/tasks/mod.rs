//! Per-service decoders: JSON object in, validated wire type out.
//!
//! Decoders return [`AnalysisError::MalformedResponse`](crate::error::AnalysisError)
//! when a reply is unusable so the analyzer can retry with a repair hint.

pub mod classification;
pub mod matching;
pub mod parsing;
