use std::fmt;

/// Errors that can occur while talking to the chat backend.
///
/// During a chat stream, `Transport` and `Protocol` are both folded into the
/// same user-visible error message. The variant only matters for logs.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Network-level failure (connection refused, timeout, reset mid-stream).
    Transport(String),
    /// The server sent something we could not understand (malformed frame, bad JSON body).
    Protocol(String),
    /// Non-2xx response from the backend.
    Api { status: u16, message: String },
    /// The receiving side of the event channel was dropped.
    ChannelClosed,
}

impl ApiError {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Protocol(_) => "protocol",
            ApiError::Api { .. } => "api",
            ApiError::ChannelClosed => "channel",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(msg) => write!(f, "transport error: {msg}"),
            ApiError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ApiError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ApiError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Protocol(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}
