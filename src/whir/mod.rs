//! One WHIR opening: parameters, commitments, the reference prover and the in-circuit
//! verifier.

pub mod batch;
pub mod committer;
pub mod hints;
pub mod parameters;
pub mod prover;
pub mod verifier;
