//! The sumcheck protocol for `Σ_x p(x) · w(x)` over the boolean hypercube.

pub mod lagrange;
pub mod prover;
pub mod verifier;
