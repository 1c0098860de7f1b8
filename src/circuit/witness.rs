use p3_field::PrimeField64;
use tracing::debug;

use super::{CircuitBuilder, Check, Lane, constraint_system::Witness};
use crate::{
    constant::DIGEST_BYTES,
    crypto::{field::to_le_bytes_exact, keccak::keccak256},
};

/// Evaluates gadgets on concrete values and collects the resulting assignment.
///
/// Allocation order matches [`super::ConstraintBuilder`] exactly. Failed assertions do not
/// abort generation; the first one is remembered so callers can report why a proof is
/// rejected.
#[derive(Debug, Default)]
pub struct WitnessGenerator<F> {
    public: Vec<F>,
    private: Vec<F>,
    first_violation: Option<Check>,
}

impl<F: PrimeField64> WitnessGenerator<F> {
    pub const fn new() -> Self {
        Self {
            public: Vec::new(),
            private: Vec::new(),
            first_violation: None,
        }
    }

    /// The first assertion that did not hold, if any.
    pub const fn first_violation(&self) -> Option<Check> {
        self.first_violation
    }

    pub fn into_witness(self) -> Witness<F> {
        Witness {
            public: self.public,
            private: self.private,
        }
    }

    fn alloc_private(&mut self, value: F) -> F {
        self.private.push(value);
        value
    }

    fn violated(&mut self, check: Check) {
        if self.first_violation.is_none() {
            debug!(?check, wire = self.private.len(), "assertion failed");
            self.first_violation = Some(check);
        }
    }
}

impl<F: PrimeField64> CircuitBuilder<F> for WitnessGenerator<F> {
    type Wire = F;

    fn constant(&mut self, value: F) -> F {
        value
    }

    fn public_input(&mut self, value: impl FnOnce() -> F) -> F {
        let value = value();
        self.public.push(value);
        value
    }

    fn private_input(&mut self, value: impl FnOnce() -> F) -> F {
        self.alloc_private(value())
    }

    fn add(&mut self, lhs: F, rhs: F) -> F {
        self.alloc_private(lhs + rhs)
    }

    fn sub(&mut self, lhs: F, rhs: F) -> F {
        self.alloc_private(lhs - rhs)
    }

    fn mul(&mut self, lhs: F, rhs: F) -> F {
        self.alloc_private(lhs * rhs)
    }

    fn mul_const(&mut self, wire: F, scalar: F) -> F {
        self.alloc_private(wire * scalar)
    }

    fn assert_zero(&mut self, wire: F, check: Check) {
        if wire != F::ZERO {
            self.violated(check);
        }
    }

    fn assert_eq(&mut self, lhs: F, rhs: F, check: Check) {
        if lhs != rhs {
            self.violated(check);
        }
    }

    fn hint<H, const IN: usize, const OUT: usize>(&mut self, inputs: [F; IN], f: H) -> [F; OUT]
    where
        H: Fn([F; IN]) -> [F; OUT],
    {
        let outputs = f(inputs);
        self.private.extend_from_slice(&outputs);
        outputs
    }

    fn keccak256(&mut self, lanes: &[Lane<F>]) -> [F; DIGEST_BYTES] {
        let mut bytes = Vec::with_capacity(lanes.iter().map(|lane| lane.width).sum());
        for lane in lanes {
            if let Some(encoded) = to_le_bytes_exact(lane.wire, lane.width) {
                bytes.extend(encoded);
            } else {
                self.violated(Check::Hash);
                let raw = lane.wire.as_canonical_u64().to_le_bytes();
                bytes.extend(raw.into_iter().chain(core::iter::repeat(0)).take(lane.width));
            }
        }
        let digest = keccak256(&bytes).map(F::from_u8);
        self.private.extend_from_slice(&digest);
        digest
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::circuit::ConstraintBuilder;

    type F = BabyBear;

    /// Gadget exercised under both builders.
    fn square_plus_hash<B: CircuitBuilder<F>>(builder: &mut B, x: F) -> B::Wire {
        let input = builder.private_input(|| x);
        let squared = builder.mul(input, input);
        let digest = builder.keccak256(&[Lane::new(squared, 4)]);
        let expected = builder.public_input(|| x * x);
        builder.assert_eq(squared, expected, Check::Wiring);
        digest[0]
    }

    #[test]
    fn test_witness_satisfies_recorded_system() {
        let mut cb = ConstraintBuilder::new();
        square_plus_hash(&mut cb, F::ZERO);
        let cs = cb.build();

        let mut wg = WitnessGenerator::new();
        let first_byte = square_plus_hash(&mut wg, F::from_u32(1234));
        assert!(wg.first_violation().is_none());
        let witness = wg.into_witness();
        assert!(cs.validate(&witness).is_ok());

        let expected = keccak256(&(1234u32 * 1234).to_le_bytes())[0];
        assert_eq!(first_byte, F::from_u8(expected));
    }

    #[test]
    fn test_oversized_lane_is_a_violation() {
        let mut cb = ConstraintBuilder::new();
        let w = cb.private_input(|| F::ZERO);
        cb.keccak256(&[Lane::byte(w)]);
        let cs = cb.build();

        let mut wg = WitnessGenerator::new();
        let w = wg.private_input(|| F::from_u32(300));
        let _ = wg.keccak256(&[Lane::byte(w)]);
        assert_eq!(wg.first_violation(), Some(Check::Hash));
        let witness = wg.into_witness();
        assert!(cs.validate(&witness).is_err());
    }
}
