//! Error types for Agent Matrix.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// First frame (or a later control frame) broke the registration protocol.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Agent id is not present in the registry.
    #[error("Unknown agent: {0}")]
    AgentUnknown(String),

    /// Read/write failure or remote close on a bound connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A message addressed to the hub itself that the hub does not handle.
    #[error("Unsupported control message '{command}' from {source_id}")]
    UnsupportedControlMessage { command: String, source_id: String },

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Web error: {0}")]
    Web(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error ends only the current connection attempt and is
    /// part of normal operation (logged, not escalated).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::ProtocolViolation(_) | Error::AgentUnknown(_) | Error::HandshakeTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(Error::AgentUnknown("ghost".to_string()).is_rejection());
        assert!(Error::ProtocolViolation("bad".to_string()).is_rejection());
        assert!(Error::HandshakeTimeout.is_rejection());
        assert!(!Error::Transport("reset".to_string()).is_rejection());
    }

    #[test]
    fn test_display() {
        let err = Error::UnsupportedControlMessage {
            command: "pong".to_string(),
            source_id: "a1".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported control message 'pong' from a1");
    }
}
