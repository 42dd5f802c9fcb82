//! Notification client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors produced by the notification client.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("request failed with HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    /// The session is missing or expired. Resolving it is the host's concern.
    #[error("unauthorized: session expired or missing")]
    Unauthorized { message: Option<String> },

    /// The backend answered 2xx but flagged the envelope as unsuccessful.
    #[error("API error: {message}")]
    Api { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid request: {0}")]
    Validation(String),

    /// Live channel failures (bad status, wrong content type, idle timeout).
    #[error("stream error: {0}")]
    Stream(String),

    /// A channel message that could not be turned into a stream event.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl NotifyError {
    /// Create a stream error.
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a malformed event error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build the error for a non-success HTTP status.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            Self::Unauthorized { message }
        } else {
            Self::Status { status, message }
        }
    }

    /// The message supplied by the server, if this error carries one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } | Self::Unauthorized { message } => message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty()),
            Self::Api { message } => Some(message.as_str()).filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }

    /// Text for a user-facing notice: the server's message, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }

    /// The HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
