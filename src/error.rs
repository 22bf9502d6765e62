use thiserror::Error;
use std::io;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that can occur while loading, extracting or analyzing logs
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generative API errors (bad status, blocked prompt, empty candidates)
    #[error("Gemini API error: {0}")]
    Api(String),

    /// Logging subsystem errors
    #[error("Logging error: {0}")]
    Logging(String),
}

impl AnalyzerError {
    /// Checks if this error came from talking to the external API
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api(_))
    }
}
