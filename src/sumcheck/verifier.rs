use p3_field::PrimeField64;

use super::lagrange::lagrange_weights_012_circuit;
use crate::{
    circuit::{Check, CircuitBuilder, gadgets},
    constant::SUMCHECK_EVALUATIONS,
    fiat_shamir::{errors::TranscriptError, replay::TranscriptReplay},
};

/// One sumcheck round: require `h(0) + h(1) == claimed_sum` and return `h(challenge)`.
pub fn fold_round<F, B>(
    builder: &mut B,
    claimed_sum: B::Wire,
    evals: &[B::Wire; SUMCHECK_EVALUATIONS],
    challenge: B::Wire,
) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let sum = builder.add(evals[0], evals[1]);
    builder.assert_eq(sum, claimed_sum, Check::Sumcheck);

    let weights = lagrange_weights_012_circuit(builder, challenge);
    gadgets::inner_product(builder, evals, &weights)
}

/// Replays `rounds` sumcheck rounds starting from `claimed_sum`.
///
/// Returns the final claim and the folding challenges in the order they were drawn, round
/// `i` binding the `i`-th remaining variable.
pub fn verify_rounds<F, B>(
    builder: &mut B,
    replay: &mut TranscriptReplay<'_, B::Wire>,
    claimed_sum: B::Wire,
    rounds: usize,
    pow_bits: usize,
) -> Result<(B::Wire, Vec<B::Wire>), TranscriptError>
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let mut claim = claimed_sum;
    let mut challenges = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let evals = replay.next_scalars(builder, SUMCHECK_EVALUATIONS)?;
        let evals = [evals[0], evals[1], evals[2]];
        let challenge = replay.next_challenge(builder)?;
        replay.next_proof_of_work_nonce(builder, pow_bits)?;

        claim = fold_round(builder, claim, &evals, challenge);
        challenges.push(challenge);
    }
    Ok((claim, challenges))
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        circuit::{ConstraintBuilder, WitnessGenerator},
        constant::DEFAULT_SESSION,
        fiat_shamir::{domain_separator::DomainSeparator, prover::ProverState},
        poly::{evals::EvaluationsList, multilinear::MultilinearPoint},
        sumcheck::prover::SumcheckProver,
    };

    type F = BabyBear;

    struct Instance {
        evals: EvaluationsList<F>,
        weights: EvaluationsList<F>,
        sum: F,
        pattern: DomainSeparator,
        transcript: Vec<u8>,
        challenges: Vec<F>,
    }

    fn instance(seed: u64, num_variables: usize, pow_bits: usize) -> Instance {
        let mut rng = StdRng::seed_from_u64(seed);
        let evals = EvaluationsList::<F>::rand(&mut rng, num_variables);
        let weights = EvaluationsList::<F>::rand(&mut rng, num_variables);
        let sum = evals
            .as_slice()
            .iter()
            .zip(weights.as_slice())
            .map(|(&e, &w)| e * w)
            .sum();

        let mut pattern = DomainSeparator::new(DEFAULT_SESSION);
        pattern.add_sumcheck::<F>(num_variables, pow_bits);
        let mut prover_state = ProverState::new(&pattern).unwrap();
        let mut prover = SumcheckProver::new(evals.clone(), weights.clone(), sum);
        let challenges = prover.compute_sumcheck_rounds(&mut prover_state, num_variables, pow_bits);

        Instance {
            evals,
            weights,
            sum,
            pattern,
            transcript: prover_state.into_narg_string(),
            challenges,
        }
    }

    fn circuit<B: CircuitBuilder<F>>(
        builder: &mut B,
        instance: &Instance,
        rounds: usize,
        pow_bits: usize,
    ) -> (B::Wire, Vec<B::Wire>) {
        let pattern = instance.pattern.compile().unwrap();
        let transcript = &instance.transcript;
        let mut replay =
            TranscriptReplay::initialize(builder, &pattern, transcript, transcript.len()).unwrap();
        let sum = builder.private_input(|| instance.sum);
        let out = verify_rounds(builder, &mut replay, sum, rounds, pow_bits).unwrap();
        replay.finish().unwrap();
        out
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn prop_folding_matches_brute_force(seed in any::<u64>(), num_variables in 2usize..=4) {
            let instance = instance(seed, num_variables, 0);

            let mut generator = WitnessGenerator::<F>::new();
            let (claim, challenges) = circuit(&mut generator, &instance, num_variables, 0);
            prop_assert_eq!(generator.first_violation(), None);
            prop_assert_eq!(&challenges, &instance.challenges);

            let point = MultilinearPoint(challenges);
            let expected = instance.evals.evaluate(&point) * instance.weights.evaluate(&point);
            prop_assert_eq!(claim, expected);

            let mut constraints = ConstraintBuilder::<F>::new();
            circuit(&mut constraints, &instance, num_variables, 0);
            prop_assert!(constraints.build().validate(&generator.into_witness()).is_ok());
        }
    }

    #[test]
    fn test_rounds_with_pow() {
        let instance = instance(7, 3, 3);
        let mut generator = WitnessGenerator::<F>::new();
        let (claim, challenges) = circuit(&mut generator, &instance, 3, 3);
        assert_eq!(generator.first_violation(), None);
        let point = MultilinearPoint(challenges);
        assert_eq!(
            claim,
            instance.evals.evaluate(&point) * instance.weights.evaluate(&point)
        );
    }

    #[test]
    fn test_tampered_round_polynomial_is_rejected() {
        let mut instance = instance(3, 3, 0);
        // h(0) of the first round
        instance.transcript[0] ^= 1;
        let mut generator = WitnessGenerator::<F>::new();
        let _ = circuit(&mut generator, &instance, 3, 0);
        assert_eq!(generator.first_violation(), Some(Check::Sumcheck));
    }

    #[test]
    fn test_fold_round() {
        // h(X) = 1 + 2X + 3X^2, claimed sum h(0) + h(1) = 7
        let h = [F::ONE, F::from_u8(6), F::from_u8(17)];
        let mut generator = WitnessGenerator::<F>::new();
        let next = fold_round(&mut generator, F::from_u8(7), &h, F::from_u8(5));
        assert_eq!(next, F::from_u8(86));
        assert_eq!(generator.first_violation(), None);

        let _ = fold_round(&mut generator, F::from_u8(8), &h, F::from_u8(5));
        assert_eq!(generator.first_violation(), Some(Check::Sumcheck));
    }
}
