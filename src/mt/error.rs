//! Error types for the Machine Translation module
use thiserror::Error;

/// Errors raised while talking to a translation backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// Provider was configured with unusable settings
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Locale code rejected before any request was made
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    /// Connection failure, timeout or similar transport problem
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Backend asked us to slow down (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Backend failed on its side (HTTP 5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    /// Backend rejected the request (HTTP 4xx other than 429)
    #[error("Client error ({status}): {message}")]
    ClientError { status: u16, message: String },
    /// Backend answered with something we cannot map back onto the request
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Translation failed for any other reason
    #[error("Translation error: {0}")]
    TranslationError(String),
}

impl MtError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MtError::NetworkError(_)
                | MtError::RateLimited(_)
                | MtError::ServerError { .. }
                | MtError::MalformedResponse(_)
                | MtError::TranslationError(_)
        )
    }
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MtError::MalformedResponse(err.to_string())
        } else {
            MtError::NetworkError(err.to_string())
        }
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
