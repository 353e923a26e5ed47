//! Error taxonomy for the chat and search paths.
//!
//! Stale search results are not errors: they are dropped silently by the
//! controller and never surface here.

use std::time::Duration;

use thiserror::Error;

/// Failure to reach the backend or to keep reading from it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("no data received for {}s", .0.as_secs())]
    IdleTimeout(Duration),
}

/// Raised by the frame decoder when the stream ends inside a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("stream ended with {pending} bytes of an unterminated frame")]
    Truncated { pending: usize },
}

/// A frame that could not be turned into an event.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("frame is not a typed JSON object: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid `{kind}` payload: {reason}")]
    Payload { kind: String, reason: String },
}

/// Outcome of a chat exchange that did not produce a model message.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("an exchange is already streaming")]
    Busy,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Explicit `error` event sent by the backend
    #[error("{0}")]
    Protocol(String),

    /// The stream closed before a `complete` event arrived
    #[error("response interrupted after {} characters", .partial.chars().count())]
    Interrupted { partial: String, unterminated: usize },

    #[error("exchange cancelled")]
    Cancelled,
}

impl ChatError {
    /// Text suitable for showing to the person chatting.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::EmptyPrompt => "Type a message first.".to_string(),
            ChatError::Busy => "Wait for the current answer to finish.".to_string(),
            ChatError::Transport(e) => format!("Error: {e}"),
            ChatError::Parse(_) => "Error: the server sent a malformed response.".to_string(),
            ChatError::Protocol(message) => message.clone(),
            ChatError::Interrupted { .. } => "Response interrupted.".to_string(),
            ChatError::Cancelled => "Response cancelled.".to_string(),
        }
    }

    /// True when the session went back to idle instead of the erred state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChatError::Interrupted { .. } | ChatError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_message_is_verbatim() {
        let err = ChatError::Protocol("model not loaded".into());
        assert_eq!(err.user_message(), "model not loaded");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_transport_message_is_prefixed() {
        let err = ChatError::from(TransportError::Status {
            status: 502,
            body: "bad gateway".into(),
        });
        assert_eq!(err.user_message(), "Error: backend returned 502: bad gateway");
    }

    #[test]
    fn test_interrupted_is_distinct_and_recoverable() {
        let err = ChatError::Interrupted {
            partial: "Hel".into(),
            unterminated: 0,
        };
        assert_eq!(err.user_message(), "Response interrupted.");
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "response interrupted after 3 characters");
    }

    #[test]
    fn test_idle_timeout_display() {
        let err = TransportError::IdleTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "no data received for 30s");
    }
}
