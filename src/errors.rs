//! Error types raised before a verifier circuit exists.
//!
//! A proof that fails to verify is not an error: it shows up as an unsatisfied constraint
//! (see [`crate::recursion::Satisfiability`]). The errors here describe inputs the circuit
//! cannot be shaped for.

use thiserror::Error;

use crate::{circuit::ValidationError, fiat_shamir::errors::TranscriptError};

/// An inconsistent configuration or hint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{field}` has {actual} entries, expected {expected}")]
    ArrayLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("folding factor of round {round} is zero")]
    ZeroFoldingFactor { round: usize },

    #[error("folding factors sum to {folded}, more than the {num_variables} variables")]
    TooManyFoldedVariables { folded: usize, num_variables: usize },

    #[error("evaluation domain of size 2^{log_domain} exceeds the field two-adicity {two_adicity}")]
    DomainTooLarge { log_domain: usize, two_adicity: usize },

    #[error("domain generator does not have order 2^{log_domain}")]
    InvalidDomainGenerator { log_domain: usize },

    #[error("commitment {round} would have fewer than two leaves")]
    CommitmentTooSmall { round: usize },

    #[error("batch size must be at least one")]
    ZeroBatchSize,

    #[error("proof-of-work of {bits} bits exceeds the maximum of {max}")]
    PowBitsTooLarge { bits: usize, max: usize },

    #[error("{what} has {actual} variables, expected {expected}")]
    ProblemSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("witness batch size {witness} differs from hiding batch size {hiding}")]
    BatchSizeMismatch { witness: usize, hiding: usize },

    #[error("{what} has {actual} entries, expected {expected}")]
    HintShape {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("leaf index {index} of opening {opening} is out of range for {leaves} leaves")]
    LeafIndexOutOfRange {
        opening: usize,
        index: usize,
        leaves: usize,
    },

    #[error("authentication path {leaf} has length {actual}, expected {expected}")]
    PathLength {
        leaf: usize,
        expected: usize,
        actual: usize,
    },

    #[error("first authentication path has a shared prefix of {prefix}")]
    NonZeroFirstPrefix { prefix: usize },

    #[error("{what} is not a canonical field element")]
    NonCanonicalFieldElement { what: String },
}

/// Top-level error type of the recursive verifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecursionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    Witness(#[from] ValidationError),
}
