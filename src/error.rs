use std::path::PathBuf;

use thiserror::Error;

use crate::mt::MtError;

/// Errors raised by the synchronization pipeline
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source language file does not exist; nothing can be synchronized
    #[error("Source locale file missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed, but its root is not a JSON object
    #[error("Invalid locale file '{}': root must be an object", .0.display())]
    InvalidLocaleFile(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Translating content for one target language failed
    #[error("Translation to '{lang}' failed: {source}")]
    Translation {
        lang: String,
        #[source]
        source: MtError,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;
