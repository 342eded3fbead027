//! Typed buffer errors.
//!
//! Capacity eviction is not an error — it is documented, expected
//! behavior. Errors here are exclusively about callers asking for
//! sequences outside what the agent can answer for.

use thiserror::Error;

/// Errors surfaced by buffer accessors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The requested sequence precedes the retained window.
    #[error("sequence {requested} is no longer available (retained window {first_sequence}..={last_sequence})")]
    SequenceUnavailable {
        requested: u64,
        first_sequence: u64,
        last_sequence: u64,
    },

    /// The requested sequence has not been allocated yet.
    #[error("sequence {requested} has not been observed yet (retained window {first_sequence}..={last_sequence})")]
    SequenceNotAllocated {
        requested: u64,
        first_sequence: u64,
        last_sequence: u64,
    },

    /// `from` and `to` cross over.
    #[error("invalid range: from {from} is beyond to {to}")]
    InvalidRange { from: u64, to: u64 },
}

/// Result type for buffer operations.
pub type BufferResult<T> = std::result::Result<T, BufferError>;
