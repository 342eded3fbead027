//! Protocol-level errors for line frame processing.
//!
//! Errors here mean a whole line was unusable. Recoverable field-level
//! problems travel as [`crate::frame::ParseDiagnostic`] instead, so a bad
//! field never costs the rest of its line.

use thiserror::Error;

/// Line parsing/serialization errors with diagnostic context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line does not have the minimum structure for its frame kind.
    #[error("malformed {what} frame: {reason} (line: {line:?})")]
    MalformedFrame {
        what: &'static str,
        reason: String,
        line: String,
    },

    /// Leading `@...@` command token is not part of the protocol.
    #[error("unknown command {command:?}")]
    UnknownCommand { command: String },

    /// Control frame (`* ...`) with an unknown verb.
    #[error("unknown control verb {verb:?}")]
    UnknownControlVerb { verb: String },

    /// Control frame with an unusable argument.
    #[error("malformed control frame: {reason}")]
    MalformedControl { reason: String },

    /// Frame cannot be expressed in the line grammar.
    #[error("frame is not representable on the wire: {reason}")]
    Unrepresentable { reason: String },
}

impl ProtocolError {
    pub fn malformed(what: &'static str, reason: impl Into<String>, line: &str) -> Self {
        Self::MalformedFrame {
            what,
            reason: reason.into(),
            line: line.to_string(),
        }
    }
}

/// Result type for codec operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
