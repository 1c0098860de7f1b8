//! A small arithmetization layer for expressing the verifier as constraints.
//!
//! Every gadget is written once against [`CircuitBuilder`] and runs under two builders:
//! - [`ConstraintBuilder`] records the constraint system without knowing any values;
//! - [`WitnessGenerator`] computes the concrete assignment for one proof.
//!
//! Both builders allocate wires in exactly the same order, so the witness produced by the
//! second lines up with the system produced by the first. For that reason wire allocation must
//! never depend on witness values: data-dependent choices are expressed with
//! [`gadgets::select`].

use core::fmt::Debug;

use p3_field::PrimeField64;

use crate::constant::DIGEST_BYTES;

pub mod builder;
pub mod constraint_system;
pub mod gadgets;
pub mod witness;

pub use builder::ConstraintBuilder;
pub use constraint_system::{
    Constraint, ConstraintSystem, ConstraintViolation, ConstraintWire, ValidationError, Witness,
    WireKind,
};
pub use witness::WitnessGenerator;

/// The reason an assertion exists.
///
/// Attached to every assertion so that an unsatisfied system reports which part of the
/// verifier rejected the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// Arithmetic gate outputs and plain equalities.
    Wiring,
    /// A wire expected to be 0 or 1.
    Boolean,
    /// A bit decomposition recomposes to its input.
    Range,
    /// A Keccak gate input fits its lane and the output matches.
    Hash,
    /// A proof-of-work digest has enough leading zero bits.
    ProofOfWork,
    /// A Merkle path hashes up to the committed root.
    MerkleRoot,
    /// The opened leaf index is the one derived from the transcript.
    QueryIndex,
    /// First-round answers are the batching combination of the raw leaves.
    BatchCombination,
    /// A sumcheck round polynomial sums to the running claim.
    Sumcheck,
    /// A folded final-round opening agrees with the final polynomial.
    StirFold,
    /// The fully folded claim matches the weight and final polynomial evaluations.
    FinalEvaluation,
    /// A public statement value matches the witness and blinding sums.
    ClaimedEvaluation,
}

/// One input lane of a Keccak gate.
///
/// The wire's canonical value is encoded little-endian in exactly `width` bytes. A value that
/// does not fit makes the gate unsatisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane<W> {
    pub wire: W,
    pub width: usize,
}

impl<W> Lane<W> {
    pub const fn new(wire: W, width: usize) -> Self {
        Self { wire, width }
    }

    /// A single byte.
    pub const fn byte(wire: W) -> Self {
        Self::new(wire, 1)
    }
}

/// Operations available to gadgets.
pub trait CircuitBuilder<F: PrimeField64> {
    type Wire: Copy + Debug;

    fn constant(&mut self, value: F) -> Self::Wire;

    fn zero(&mut self) -> Self::Wire {
        self.constant(F::ZERO)
    }

    fn one(&mut self) -> Self::Wire {
        self.constant(F::ONE)
    }

    /// Allocate a wire whose value is part of the public statement.
    ///
    /// The closure is only called when values are being assigned.
    fn public_input(&mut self, value: impl FnOnce() -> F) -> Self::Wire;

    /// Allocate a witness-only wire.
    ///
    /// The closure is only called when values are being assigned.
    fn private_input(&mut self, value: impl FnOnce() -> F) -> Self::Wire;

    fn add(&mut self, lhs: Self::Wire, rhs: Self::Wire) -> Self::Wire;

    fn sub(&mut self, lhs: Self::Wire, rhs: Self::Wire) -> Self::Wire;

    fn mul(&mut self, lhs: Self::Wire, rhs: Self::Wire) -> Self::Wire;

    fn mul_const(&mut self, wire: Self::Wire, scalar: F) -> Self::Wire;

    fn add_const(&mut self, wire: Self::Wire, scalar: F) -> Self::Wire {
        let constant = self.constant(scalar);
        self.add(wire, constant)
    }

    fn assert_zero(&mut self, wire: Self::Wire, check: Check);

    fn assert_eq(&mut self, lhs: Self::Wire, rhs: Self::Wire, check: Check) {
        let diff = self.sub(lhs, rhs);
        self.assert_zero(diff, check);
    }

    /// Compute helper values outside the constraint system.
    ///
    /// The outputs are unconstrained: the caller must constrain them.
    fn hint<H, const IN: usize, const OUT: usize>(
        &mut self,
        inputs: [Self::Wire; IN],
        f: H,
    ) -> [Self::Wire; OUT]
    where
        H: Fn([F; IN]) -> [F; OUT];

    /// Keccak-256 over the concatenated lanes, returned as 32 byte wires.
    fn keccak256(&mut self, lanes: &[Lane<Self::Wire>]) -> [Self::Wire; DIGEST_BYTES];
}
