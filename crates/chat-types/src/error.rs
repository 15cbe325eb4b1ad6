use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Free message limit reached ({limit} messages). Sign in to keep chatting.")]
    QuotaExceeded { limit: u32 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    Validation(String),

    #[error("Stream error ({code}): {message}")]
    StreamProtocol { code: StreamErrorCode, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ChatError {
    /// Network or HTTP level failure of a backend call.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::Http { .. } | ChatError::Network(_) | ChatError::Timeout(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}

/// Error codes the backend prefixes to `error` stream events
/// (`"RATE_LIMITED: too many requests"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamErrorCode {
    Internal,
    Timeout,
    RateLimited,
    ContextTooLong,
    ModelUnavailable,
    InvalidRequest,
    /// Payload carried no recognizable code
    Unclassified,
}

impl StreamErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamErrorCode::Internal => "INTERNAL",
            StreamErrorCode::Timeout => "TIMEOUT",
            StreamErrorCode::RateLimited => "RATE_LIMITED",
            StreamErrorCode::ContextTooLong => "CONTEXT_TOO_LONG",
            StreamErrorCode::ModelUnavailable => "MODEL_UNAVAILABLE",
            StreamErrorCode::InvalidRequest => "INVALID_REQUEST",
            StreamErrorCode::Unclassified => "UNCLASSIFIED",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "INTERNAL" => StreamErrorCode::Internal,
            "TIMEOUT" => StreamErrorCode::Timeout,
            "RATE_LIMITED" => StreamErrorCode::RateLimited,
            "CONTEXT_TOO_LONG" => StreamErrorCode::ContextTooLong,
            "MODEL_UNAVAILABLE" => StreamErrorCode::ModelUnavailable,
            "INVALID_REQUEST" => StreamErrorCode::InvalidRequest,
            _ => return None,
        })
    }

    /// Split an `error` event payload into its code and message.
    pub fn parse(payload: &str) -> (StreamErrorCode, String) {
        if let Some((code, rest)) = payload.split_once(':') {
            if let Some(code) = StreamErrorCode::from_code(code.trim()) {
                return (code, rest.trim().to_string());
            }
        }
        (StreamErrorCode::Unclassified, payload.trim().to_string())
    }
}

impl fmt::Display for StreamErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
