//! Errors raised while compiling a transcript pattern or replaying a transcript.
//!
//! All of these are detected before any constraint is emitted: they describe inputs the
//! verifier circuit cannot even be shaped for, not proofs it rejects.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// The declared transcript length disagrees with the bytes supplied.
    #[error("malformed transcript: declared {declared} bytes but {actual} were supplied")]
    MalformedTranscript { declared: usize, actual: usize },

    /// The pattern absorbs more bytes than the transcript holds.
    #[error("transcript pattern absorbs {required} bytes but the transcript holds {supplied}")]
    PatternExceedsTranscript { required: usize, supplied: usize },

    /// The transcript holds bytes past the last absorb of the pattern.
    #[error("transcript holds {supplied} bytes but the pattern absorbs only {required}")]
    TrailingTranscriptBytes { required: usize, supplied: usize },

    /// An operation character outside of `A`, `S` and `R`.
    #[error("unsupported pattern token {token:?} at position {position}")]
    UnsupportedToken { position: usize, token: String },

    /// `A` or `S` without a positive count.
    #[error("pattern operation {position} needs a positive count")]
    MissingCount { position: usize },

    /// `R` followed by a count.
    #[error("pattern operation {position} does not take a count")]
    UnexpectedCount { position: usize },

    #[error("invalid label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: &'static str },

    /// The verifier asked for an operation the pattern does not have at this point.
    #[error("transcript pattern mismatch at operation {position}: expected {expected}, found {found}")]
    PatternMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    /// The verifier asked for more operations than the pattern describes.
    #[error("transcript pattern exhausted while requesting {requested}")]
    PatternExhausted { requested: String },

    /// The verifier finished before consuming the whole pattern.
    #[error("{remaining} transcript pattern operations were never consumed")]
    UnconsumedPattern { remaining: usize },
}
