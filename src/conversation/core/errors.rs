//! Error types for the conversation subsystem.

use thiserror::Error;

/// Conversation subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The history has not been loaded yet.
    #[error("conversation history is not loaded; call load_history first")]
    NotLoaded,
    /// The caller sent an empty or whitespace-only message.
    #[error("message is empty")]
    EmptyMessage,
    /// No API key is configured for the remote model.
    #[error("no API key configured for the model provider")]
    MissingApiKey,
    /// The model provider answered with a non-success status.
    #[error("model provider returned {status}: {message}")]
    RemoteStatus {
        /// HTTP status code.
        status: u16,
        /// Provider error message, or the raw body.
        message: String,
    },
    /// The model provider answered without usable text.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    /// The remote call did not finish within the configured timeout.
    #[error("model request timed out after {0} ms")]
    Timeout(u64),
    /// HTTP client error.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    /// `SQLite` storage error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Storage backend failure that is not tied to a specific driver.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Convenience result alias for conversation operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_display() {
        let err = ChatError::RemoteStatus {
            status: 403,
            message: "PERMISSION_DENIED: bad key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "model provider returned 403: PERMISSION_DENIED: bad key"
        );
    }
}
