//! Batching and the closing statement check.
//!
//! A batch of `B` polynomials is opened as one random linear combination with coefficients
//! `(1, γ, ..., γ^(B-1))`. The vector is drawn once per instance by the round verifier and
//! handed back so the combined statement and the first-round leaves use the same one.

use itertools::izip;
use p3_field::PrimeField64;

use super::hints::ClaimedEvaluations;
use crate::{
    circuit::{Check, CircuitBuilder, gadgets},
    fiat_shamir::{errors::TranscriptError, replay::TranscriptReplay},
};

/// `(1, γ, ..., γ^(B-1))`, squeezing `γ` only when `batch_size > 1`.
pub fn batching_randomness<F, B>(
    builder: &mut B,
    replay: &mut TranscriptReplay<'_, B::Wire>,
    batch_size: usize,
) -> Result<Vec<B::Wire>, TranscriptError>
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    if batch_size == 1 {
        return Ok(vec![builder.one()]);
    }
    let gamma = replay.next_challenge(builder)?;
    Ok(gadgets::powers(builder, gamma, batch_size))
}

/// `Σ_j γ^j · values[j]`; the value itself for a single polynomial.
pub fn combine<F, B>(builder: &mut B, gammas: &[B::Wire], values: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    assert_eq!(gammas.len(), values.len());
    if let [value] = values {
        return *value;
    }
    gadgets::inner_product(builder, gammas, values)
}

/// Requires `expected[a] == Σ_j γ^j · raw[j · 2^k + a]` for a polynomial-major leaf `raw`.
pub fn assert_leaf_combination<F, B>(
    builder: &mut B,
    gammas: &[B::Wire],
    raw: &[B::Wire],
    expected: &[B::Wire],
) where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let width = expected.len();
    assert_eq!(raw.len(), gammas.len() * width);
    for (a, &expected) in expected.iter().enumerate() {
        let column: Vec<_> = raw.iter().skip(a).step_by(width).copied().collect();
        let combined = combine(builder, gammas, &column);
        builder.assert_eq(combined, expected, Check::BatchCombination);
    }
}

/// Requires every public statement value to be `S_j = F_j + ρ · G_j`.
pub fn verify_claimed_evaluations<F, B>(
    builder: &mut B,
    claimed: &ClaimedEvaluations<B::Wire>,
    blinding_challenge: B::Wire,
    statement_values: &[B::Wire],
) where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    assert_eq!(claimed.f_sums.len(), statement_values.len());
    assert_eq!(claimed.g_sums.len(), statement_values.len());
    for (&f, &g, &statement) in izip!(&claimed.f_sums, &claimed.g_sums, statement_values) {
        let blinded = builder.mul(blinding_challenge, g);
        let expected = builder.add(f, blinded);
        builder.assert_eq(statement, expected, Check::ClaimedEvaluation);
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::circuit::{ConstraintBuilder, WitnessGenerator};

    type F = BabyBear;

    fn f(values: &[u32]) -> Vec<F> {
        values.iter().map(|&v| F::from_u32(v)).collect()
    }

    #[test]
    fn test_single_polynomial_combination_is_identity() {
        let mut constraints = ConstraintBuilder::<F>::new();
        let one = constraints.one();
        let value = constraints.private_input(|| F::ZERO);
        let combined = combine(&mut constraints, &[one], &[value]);
        assert_eq!(combined, value);
        assert_eq!(constraints.build().num_constraints(), 0);
    }

    #[test]
    fn test_leaf_combination() {
        // two polynomials, leaves of width 2, γ = 3
        let gammas = f(&[1, 3]);
        let raw = f(&[1, 2, 10, 20]);

        let mut generator = WitnessGenerator::<F>::new();
        assert_leaf_combination(&mut generator, &gammas, &raw, &f(&[31, 62]));
        assert_eq!(generator.first_violation(), None);

        assert_leaf_combination(&mut generator, &gammas, &raw, &f(&[31, 61]));
        assert_eq!(generator.first_violation(), Some(Check::BatchCombination));
    }

    #[test]
    fn test_claimed_evaluations() {
        let claimed = ClaimedEvaluations {
            f_sums: f(&[5, 6]),
            g_sums: f(&[1, 2]),
        };
        let rho = F::from_u32(10);

        let mut generator = WitnessGenerator::<F>::new();
        verify_claimed_evaluations(&mut generator, &claimed, rho, &f(&[15, 26]));
        assert_eq!(generator.first_violation(), None);

        verify_claimed_evaluations(&mut generator, &claimed, rho, &f(&[15, 25]));
        assert_eq!(generator.first_violation(), Some(Check::ClaimedEvaluation));
    }
}
