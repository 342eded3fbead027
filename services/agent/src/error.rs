//! Query-side errors.

use buffer::BufferError;
use thiserror::Error;

/// Errors a query can fail with. Sequence/range problems are returned to
/// the caller, never silently substituted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// `at`/`from` fell outside the retained window.
    #[error("sequence {requested} is outside the retained window {first_sequence}..={last_sequence}")]
    SequenceOutOfRange {
        requested: u64,
        first_sequence: u64,
        last_sequence: u64,
    },

    /// `from`/`to` cross over.
    #[error("invalid range: from {from} is beyond to {to}")]
    InvalidRange { from: u64, to: u64 },

    /// Requested count exceeds the configured maximum.
    #[error("count {requested} exceeds the maximum of {max}")]
    CountTooLarge { requested: usize, max: usize },

    /// The stream was cancelled (caller disconnect or agent shutdown).
    #[error("stream cancelled")]
    Cancelled,
}

impl From<BufferError> for QueryError {
    fn from(error: BufferError) -> Self {
        match error {
            BufferError::SequenceUnavailable {
                requested,
                first_sequence,
                last_sequence,
            } => QueryError::SequenceOutOfRange {
                requested,
                first_sequence,
                last_sequence,
            },
            BufferError::SequenceNotAllocated {
                requested,
                first_sequence,
                last_sequence,
            } => QueryError::SequenceOutOfRange {
                requested,
                first_sequence,
                last_sequence,
            },
            BufferError::InvalidRange { from, to } => QueryError::InvalidRange { from, to },
        }
    }
}
