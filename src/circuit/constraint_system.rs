use p3_field::PrimeField64;
use thiserror::Error;

use super::{Check, Lane};
use crate::{
    constant::DIGEST_BYTES,
    crypto::{field::to_le_bytes_exact, keccak::keccak256},
};

/// Where a wire's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Constant,
    Public,
    Private,
}

/// A wire of a recorded constraint system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintWire {
    pub kind: WireKind,
    pub id: usize,
}

impl ConstraintWire {
    pub(crate) const fn new(kind: WireKind, id: usize) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint<F> {
    /// `Σ coeff · wire == 0`.
    Linear {
        terms: Vec<(F, ConstraintWire)>,
        check: Check,
    },
    /// `a · b == c`.
    Mul {
        a: ConstraintWire,
        b: ConstraintWire,
        c: ConstraintWire,
        check: Check,
    },
    /// `output == keccak256(lanes)`, one byte per output wire.
    Keccak {
        lanes: Vec<Lane<ConstraintWire>>,
        output: [ConstraintWire; DIGEST_BYTES],
    },
}

impl<F> Constraint<F> {
    pub const fn check(&self) -> Check {
        match self {
            Self::Linear { check, .. } | Self::Mul { check, .. } => *check,
            Self::Keccak { .. } => Check::Hash,
        }
    }
}

/// An assignment for the public and private wires of a [`ConstraintSystem`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness<F> {
    pub public: Vec<F>,
    pub private: Vec<F>,
}

/// The first constraint an assignment fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("constraint {index} is not satisfied ({check:?})")]
pub struct ConstraintViolation {
    pub index: usize,
    pub check: Check,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("witness has {actual} {visibility} values, the system expects {expected}")]
    WitnessShape {
        visibility: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Unsatisfied(#[from] ConstraintViolation),
}

/// A fixed-shape constraint system over `F`.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem<F> {
    pub(crate) constants: Vec<F>,
    pub(crate) num_public: usize,
    pub(crate) num_private: usize,
    pub(crate) constraints: Vec<Constraint<F>>,
}

impl<F: PrimeField64> ConstraintSystem<F> {
    pub const fn num_public(&self) -> usize {
        self.num_public
    }

    pub const fn num_private(&self) -> usize {
        self.num_private
    }

    pub const fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[Constraint<F>] {
        &self.constraints
    }

    /// Number of constraints per check, in first-seen order.
    pub fn census(&self) -> Vec<(Check, usize)> {
        let mut out: Vec<(Check, usize)> = Vec::new();
        for constraint in &self.constraints {
            let check = constraint.check();
            match out.iter_mut().find(|(c, _)| *c == check) {
                Some((_, count)) => *count += 1,
                None => out.push((check, 1)),
            }
        }
        out
    }

    /// Check every constraint against `witness`, stopping at the first failure.
    pub fn validate(&self, witness: &Witness<F>) -> Result<(), ValidationError> {
        if witness.public.len() != self.num_public {
            return Err(ValidationError::WitnessShape {
                visibility: "public",
                expected: self.num_public,
                actual: witness.public.len(),
            });
        }
        if witness.private.len() != self.num_private {
            return Err(ValidationError::WitnessShape {
                visibility: "private",
                expected: self.num_private,
                actual: witness.private.len(),
            });
        }

        let value = |wire: &ConstraintWire| match wire.kind {
            WireKind::Constant => self.constants[wire.id],
            WireKind::Public => witness.public[wire.id],
            WireKind::Private => witness.private[wire.id],
        };

        for (index, constraint) in self.constraints.iter().enumerate() {
            let satisfied = match constraint {
                Constraint::Linear { terms, .. } => terms
                    .iter()
                    .map(|(coeff, wire)| *coeff * value(wire))
                    .sum::<F>()
                    == F::ZERO,
                Constraint::Mul { a, b, c, .. } => value(a) * value(b) == value(c),
                Constraint::Keccak { lanes, output } => {
                    let mut bytes = Vec::new();
                    let fits = lanes.iter().all(|lane| {
                        to_le_bytes_exact(value(&lane.wire), lane.width)
                            .map(|encoded| bytes.extend(encoded))
                            .is_some()
                    });
                    fits && keccak256(&bytes)
                        .iter()
                        .zip(output)
                        .all(|(&byte, wire)| value(wire) == F::from_u8(byte))
                }
            };
            if !satisfied {
                return Err(ConstraintViolation {
                    index,
                    check: constraint.check(),
                }
                .into());
            }
        }
        Ok(())
    }
}
