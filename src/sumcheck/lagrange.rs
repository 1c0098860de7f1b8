//! Lagrange interpolation at the points `{0, 1, 2}`.
//!
//! A sumcheck round polynomial is quadratic and sent as `h(0), h(1), h(2)`; its value at any
//! `r` is recovered as
//!
//! ```text
//! h(r) = h(0) * L_0(r) + h(1) * L_1(r) + h(2) * L_2(r)
//! ```

use p3_field::{Field, PrimeField64};

use crate::circuit::CircuitBuilder;

/// `[L_0(r), L_1(r), L_2(r)]` for the interpolation set `{0, 1, 2}`:
///
/// ```text
/// L_0(x) = (x - 1)(x - 2) / 2
/// L_1(x) = x(2 - x)
/// L_2(x) = x(x - 1) / 2
/// ```
pub fn lagrange_weights_012<F: Field>(r: F) -> [F; 3] {
    let inv_two = F::TWO.inverse();
    let l0 = (r - F::ONE) * (r - F::TWO) * inv_two;
    let l1 = r * (F::TWO - r);
    let l2 = r * (r - F::ONE) * inv_two;
    [l0, l1, l2]
}

/// `h(r)` from `[h(0), h(1), h(2)]`.
pub fn extrapolate_012<F: Field>(evals: [F; 3], r: F) -> F {
    let weights = lagrange_weights_012(r);
    evals.iter().zip(weights).map(|(&e, w)| e * w).sum()
}

/// [`lagrange_weights_012`] as constraints.
pub fn lagrange_weights_012_circuit<F, B>(builder: &mut B, r: B::Wire) -> [B::Wire; 3]
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let inv_two = F::TWO.inverse();
    let r_minus_one = builder.add_const(r, F::NEG_ONE);
    let r_minus_two = builder.add_const(r, -F::TWO);

    let product = builder.mul(r_minus_one, r_minus_two);
    let l0 = builder.mul_const(product, inv_two);

    let neg_r = builder.mul_const(r, F::NEG_ONE);
    let two_minus_r = builder.add_const(neg_r, F::TWO);
    let l1 = builder.mul(r, two_minus_r);

    let product = builder.mul(r, r_minus_one);
    let l2 = builder.mul_const(product, inv_two);

    [l0, l1, l2]
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;
    use proptest::prelude::*;

    use super::*;
    use crate::circuit::WitnessGenerator;

    type F = BabyBear;

    #[test]
    fn test_weights_are_kronecker_on_nodes() {
        assert_eq!(lagrange_weights_012(F::ZERO), [F::ONE, F::ZERO, F::ZERO]);
        assert_eq!(lagrange_weights_012(F::ONE), [F::ZERO, F::ONE, F::ZERO]);
        assert_eq!(lagrange_weights_012(F::TWO), [F::ZERO, F::ZERO, F::ONE]);
    }

    proptest! {
        #[test]
        fn prop_extrapolation_matches_quadratic(
            c0 in any::<u32>(), c1 in any::<u32>(), c2 in any::<u32>(), r in any::<u32>()
        ) {
            let (c0, c1, c2, r) = (F::from_u32(c0), F::from_u32(c1), F::from_u32(c2), F::from_u32(r));
            let h = |x: F| c0 + c1 * x + c2 * x.square();
            prop_assert_eq!(extrapolate_012([h(F::ZERO), h(F::ONE), h(F::TWO)], r), h(r));

            let weights = lagrange_weights_012(r);
            prop_assert_eq!(weights.iter().copied().sum::<F>(), F::ONE);

            let mut generator = WitnessGenerator::<F>::new();
            prop_assert_eq!(lagrange_weights_012_circuit(&mut generator, r), weights);
        }
    }
}
