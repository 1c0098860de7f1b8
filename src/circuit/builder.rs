use std::collections::BTreeMap;

use p3_field::PrimeField64;

use super::{
    CircuitBuilder, Check, Lane,
    constraint_system::{Constraint, ConstraintSystem, ConstraintWire, WireKind},
};
use crate::constant::DIGEST_BYTES;

/// Records the constraint system without assigning any values.
#[derive(Debug, Default)]
pub struct ConstraintBuilder<F> {
    constants: Vec<F>,
    constant_ids: BTreeMap<u64, usize>,
    num_public: usize,
    num_private: usize,
    constraints: Vec<Constraint<F>>,
}

impl<F: PrimeField64> ConstraintBuilder<F> {
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            constant_ids: BTreeMap::new(),
            num_public: 0,
            num_private: 0,
            constraints: Vec::new(),
        }
    }

    pub fn build(self) -> ConstraintSystem<F> {
        ConstraintSystem {
            constants: self.constants,
            num_public: self.num_public,
            num_private: self.num_private,
            constraints: self.constraints,
        }
    }

    fn alloc_private(&mut self) -> ConstraintWire {
        let wire = ConstraintWire::new(WireKind::Private, self.num_private);
        self.num_private += 1;
        wire
    }

    fn linear(&mut self, terms: Vec<(F, ConstraintWire)>, check: Check) {
        self.constraints.push(Constraint::Linear { terms, check });
    }
}

impl<F: PrimeField64> CircuitBuilder<F> for ConstraintBuilder<F> {
    type Wire = ConstraintWire;

    fn constant(&mut self, value: F) -> ConstraintWire {
        let next = self.constants.len();
        let id = *self
            .constant_ids
            .entry(value.as_canonical_u64())
            .or_insert(next);
        if id == next {
            self.constants.push(value);
        }
        ConstraintWire::new(WireKind::Constant, id)
    }

    fn public_input(&mut self, _value: impl FnOnce() -> F) -> ConstraintWire {
        let wire = ConstraintWire::new(WireKind::Public, self.num_public);
        self.num_public += 1;
        wire
    }

    fn private_input(&mut self, _value: impl FnOnce() -> F) -> ConstraintWire {
        self.alloc_private()
    }

    fn add(&mut self, lhs: ConstraintWire, rhs: ConstraintWire) -> ConstraintWire {
        let out = self.alloc_private();
        self.linear(
            vec![(F::ONE, lhs), (F::ONE, rhs), (F::NEG_ONE, out)],
            Check::Wiring,
        );
        out
    }

    fn sub(&mut self, lhs: ConstraintWire, rhs: ConstraintWire) -> ConstraintWire {
        let out = self.alloc_private();
        self.linear(
            vec![(F::ONE, lhs), (F::NEG_ONE, rhs), (F::NEG_ONE, out)],
            Check::Wiring,
        );
        out
    }

    fn mul(&mut self, lhs: ConstraintWire, rhs: ConstraintWire) -> ConstraintWire {
        let out = self.alloc_private();
        self.constraints.push(Constraint::Mul {
            a: lhs,
            b: rhs,
            c: out,
            check: Check::Wiring,
        });
        out
    }

    fn mul_const(&mut self, wire: ConstraintWire, scalar: F) -> ConstraintWire {
        let out = self.alloc_private();
        self.linear(vec![(scalar, wire), (F::NEG_ONE, out)], Check::Wiring);
        out
    }

    fn assert_zero(&mut self, wire: ConstraintWire, check: Check) {
        self.linear(vec![(F::ONE, wire)], check);
    }

    fn assert_eq(&mut self, lhs: ConstraintWire, rhs: ConstraintWire, check: Check) {
        self.linear(vec![(F::ONE, lhs), (F::NEG_ONE, rhs)], check);
    }

    fn hint<H, const IN: usize, const OUT: usize>(
        &mut self,
        _inputs: [ConstraintWire; IN],
        _f: H,
    ) -> [ConstraintWire; OUT]
    where
        H: Fn([F; IN]) -> [F; OUT],
    {
        core::array::from_fn(|_| self.alloc_private())
    }

    fn keccak256(&mut self, lanes: &[Lane<ConstraintWire>]) -> [ConstraintWire; DIGEST_BYTES] {
        let output = core::array::from_fn(|_| self.alloc_private());
        self.constraints.push(Constraint::Keccak {
            lanes: lanes.to_vec(),
            output,
        });
        output
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::circuit::{ConstraintViolation, ValidationError, Witness};

    type F = BabyBear;

    #[test]
    fn test_constants_are_deduplicated() {
        let mut builder = ConstraintBuilder::<F>::new();
        let a = builder.constant(F::from_u32(5));
        let b = builder.constant(F::from_u32(5));
        let c = builder.constant(F::from_u32(6));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(builder.build().constants.len(), 2);
    }

    #[test]
    fn test_validate_reports_first_failure() {
        let mut builder = ConstraintBuilder::<F>::new();
        let x = builder.public_input(|| F::ZERO);
        let y = builder.private_input(|| F::ZERO);
        let z = builder.mul(x, y);
        let nine = builder.constant(F::from_u32(9));
        builder.assert_eq(z, nine, Check::Sumcheck);
        let cs = builder.build();
        assert_eq!(cs.num_public(), 1);
        assert_eq!(cs.num_private(), 2);

        let good = Witness {
            public: vec![F::from_u32(3)],
            private: vec![F::from_u32(3), F::from_u32(9)],
        };
        assert!(cs.validate(&good).is_ok());

        let bad = Witness {
            public: vec![F::from_u32(3)],
            private: vec![F::from_u32(4), F::from_u32(12)],
        };
        assert_eq!(
            cs.validate(&bad),
            Err(ConstraintViolation {
                index: 1,
                check: Check::Sumcheck,
            }
            .into())
        );
    }

    #[test]
    fn test_validate_rejects_wrong_witness_length() {
        let mut builder = ConstraintBuilder::<F>::new();
        let _ = builder.private_input(|| F::ZERO);
        let cs = builder.build();
        let err = cs.validate(&Witness::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::WitnessShape {
                visibility: "private",
                expected: 1,
                actual: 0,
            }
        ));
    }
}
