use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("LLM backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("LLM stream timed out after {0:?}")]
    Timeout(Duration),

    #[error("Corrupt trajectory file {}: {reason}", path.display())]
    Deserialization { path: PathBuf, reason: String },

    #[error("Point {index} has non-finite coordinates ({x}, {y})")]
    NonFinitePoint { index: usize, x: f64, y: f64 },

    #[error("No JSON object found in model output")]
    MissingStructuredOutput,

    #[error("Malformed JSON object in model output ({diagnostic}): {raw}")]
    MalformedStructuredOutput { raw: String, diagnostic: String },

    #[error("JSON object in model output is missing key '{missing}'")]
    IncompleteStructuredOutput { missing: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl WalkError {
    /// Errors on the prediction path that degrade to the heuristic step
    /// instead of reaching the caller.
    pub fn is_recoverable_by_fallback(&self) -> bool {
        matches!(
            self,
            WalkError::LlmProvider(_)
                | WalkError::SseParsing(_)
                | WalkError::BackendUnavailable(_)
                | WalkError::Timeout(_)
                | WalkError::MissingStructuredOutput
                | WalkError::MalformedStructuredOutput { .. }
                | WalkError::IncompleteStructuredOutput { .. }
                | WalkError::Http(_)
                | WalkError::Json(_)
                | WalkError::Config(_)
        )
    }
}

pub type WalkResult<T> = Result<T, WalkError>;
