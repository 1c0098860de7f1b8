use core::ops::Deref;

use p3_field::{PrimeField64, TwoAdicField};
use tracing::{debug, instrument};

use super::{
    batch::{assert_leaf_combination, batching_randomness, combine},
    committer::reader::{ParsedCommitment, RootVisibility, read_commitment},
    hints::InstanceHint,
    parameters::RoundParameters,
};
use crate::{
    circuit::{Check, CircuitBuilder, gadgets},
    constant::DIGEST_BYTES,
    fiat_shamir::{errors::TranscriptError, replay::TranscriptReplay},
    merkle_tree::{MerkleBatch, MerklePathVerifier},
    sumcheck::verifier::verify_rounds,
};

/// A claim `p(point) == value` on the polynomial being folded.
#[derive(Debug, Clone)]
pub struct Constraint<W> {
    pub point: Vec<W>,
    pub value: W,
}

/// Verifies one WHIR opening proof inside the circuit.
#[derive(Debug)]
pub struct WhirRoundVerifier<'a, F>(&'a RoundParameters<F>);

impl<'a, F> WhirRoundVerifier<'a, F>
where
    F: PrimeField64 + TwoAdicField,
{
    pub const fn new(params: &'a RoundParameters<F>) -> Self {
        Self(params)
    }

    /// Verifies that the committed batch, combined with the batching randomness, evaluates at
    /// `statement_point` to the same combination of `statement_values`.
    ///
    /// Returns the batching vector `(1, γ, ..., γ^(B-1))` that was drawn.
    #[instrument(skip_all, fields(num_variables = self.num_variables, num_rounds = self.num_rounds))]
    pub fn verify<B>(
        &self,
        builder: &mut B,
        replay: &mut TranscriptReplay<'_, B::Wire>,
        commitment: &ParsedCommitment<B::Wire>,
        statement_point: &[B::Wire],
        statement_values: &[B::Wire],
        hint: &InstanceHint<F>,
    ) -> Result<Vec<B::Wire>, TranscriptError>
    where
        B: CircuitBuilder<F>,
    {
        assert_eq!(statement_point.len(), self.num_variables);
        assert_eq!(statement_values.len(), self.batch_size);

        let gammas = batching_randomness(builder, replay, self.batch_size)?;

        // Constraints are kept with their combination randomness until the weights are
        // evaluated at the very end.
        let mut round_constraints = Vec::with_capacity(self.num_rounds + 1);
        let mut challenges = Vec::with_capacity(self.num_variables);
        let mut claimed_sum = builder.zero();

        let mut constraints = Vec::with_capacity(commitment.ood_points.len() + 1);
        for (&ood_point, answers) in commitment.ood_points.iter().zip(&commitment.ood_answers) {
            constraints.push(Constraint {
                point: gadgets::expand_from_univariate(builder, ood_point, self.num_variables),
                value: combine(builder, &gammas, answers),
            });
        }
        constraints.push(Constraint {
            point: statement_point.to_vec(),
            value: combine(builder, &gammas, statement_values),
        });
        let combination_randomness =
            self.combine_constraints(builder, replay, &mut claimed_sum, &constraints)?;
        round_constraints.push((combination_randomness, constraints));

        let (sum, mut folding_randomness) = verify_rounds(
            builder,
            replay,
            claimed_sum,
            self.commitments[0].folding_factor,
            0,
        )?;
        claimed_sum = sum;
        challenges.extend_from_slice(&folding_randomness);
        let mut prev_root = commitment.root;

        for round in 0..self.num_rounds {
            let opened = &self.commitments[round];
            let next = &self.commitments[round + 1];

            let new_commitment = read_commitment(
                builder,
                replay,
                RootVisibility::Private,
                next.ood_samples,
                1,
            )?;
            replay.next_proof_of_work_nonce(builder, opened.pow_bits)?;
            let stir_answers = self.verify_stir_challenges(
                builder,
                replay,
                round,
                &prev_root,
                &folding_randomness,
                &gammas,
                hint,
            )?;

            let mut constraints =
                Vec::with_capacity(new_commitment.ood_points.len() + stir_answers.len());
            for (&ood_point, answers) in new_commitment
                .ood_points
                .iter()
                .zip(&new_commitment.ood_answers)
            {
                constraints.push(Constraint {
                    point: gadgets::expand_from_univariate(builder, ood_point, next.num_variables),
                    value: answers[0],
                });
            }
            for (stir_point, folded) in stir_answers {
                constraints.push(Constraint {
                    point: gadgets::expand_from_univariate(builder, stir_point, next.num_variables),
                    value: folded,
                });
            }
            let combination_randomness =
                self.combine_constraints(builder, replay, &mut claimed_sum, &constraints)?;
            round_constraints.push((combination_randomness, constraints));

            let (sum, randomness) =
                verify_rounds(builder, replay, claimed_sum, next.folding_factor, 0)?;
            claimed_sum = sum;
            challenges.extend_from_slice(&randomness);
            folding_randomness = randomness;
            prev_root = new_commitment.root;
            debug!(round, "round verified");
        }

        // The final polynomial is sent in the clear, as its evaluations over the hypercube.
        let final_evaluations = replay.next_scalars(builder, 1 << self.final_sumcheck_rounds)?;
        replay.next_proof_of_work_nonce(builder, self.last_commitment().pow_bits)?;
        let stir_answers = self.verify_stir_challenges(
            builder,
            replay,
            self.num_rounds,
            &prev_root,
            &folding_randomness,
            &gammas,
            hint,
        )?;
        for (stir_point, folded) in stir_answers {
            let point =
                gadgets::expand_from_univariate(builder, stir_point, self.final_sumcheck_rounds);
            let expected = gadgets::evaluate_multilinear(builder, &final_evaluations, &point);
            builder.assert_eq(folded, expected, Check::StirFold);
        }

        let (final_claim, final_randomness) = verify_rounds(
            builder,
            replay,
            claimed_sum,
            self.final_sumcheck_rounds,
            self.final_folding_pow_bits,
        )?;
        challenges.extend_from_slice(&final_randomness);

        // W(r) · p_final(r_final), where each constraint set is evaluated on the challenges
        // drawn after it was added.
        let mut weight = builder.zero();
        for (coeffs, constraints) in &round_constraints {
            for (&coeff, constraint) in coeffs.iter().zip(constraints) {
                let suffix = &challenges[challenges.len() - constraint.point.len()..];
                let eq = gadgets::eq_eval(builder, &constraint.point, suffix);
                let term = builder.mul(coeff, eq);
                weight = builder.add(weight, term);
            }
        }
        let final_value =
            gadgets::evaluate_multilinear(builder, &final_evaluations, &final_randomness);
        let expected = builder.mul(weight, final_value);
        builder.assert_eq(final_claim, expected, Check::FinalEvaluation);

        Ok(gammas)
    }

    /// Squeezes the combination randomness `α` and adds `Σ α^i · value_i` to the claim.
    fn combine_constraints<B>(
        &self,
        builder: &mut B,
        replay: &mut TranscriptReplay<'_, B::Wire>,
        claimed_sum: &mut B::Wire,
        constraints: &[Constraint<B::Wire>],
    ) -> Result<Vec<B::Wire>, TranscriptError>
    where
        B: CircuitBuilder<F>,
    {
        let alpha = replay.next_challenge(builder)?;
        let coeffs = gadgets::powers(builder, alpha, constraints.len());
        let values: Vec<_> = constraints.iter().map(|c| c.value).collect();
        let combined = gadgets::inner_product(builder, &coeffs, &values);
        *claimed_sum = builder.add(*claimed_sum, combined);
        Ok(coeffs)
    }

    /// Opens commitment `round` at the transcript's query indexes and folds every opened leaf.
    ///
    /// Returns the in-domain points `leaf_generator^index` with the folded values there.
    #[allow(clippy::too_many_arguments)]
    fn verify_stir_challenges<B>(
        &self,
        builder: &mut B,
        replay: &mut TranscriptReplay<'_, B::Wire>,
        round: usize,
        root: &[B::Wire; DIGEST_BYTES],
        folding_randomness: &[B::Wire],
        gammas: &[B::Wire],
        hint: &InstanceHint<F>,
    ) -> Result<Vec<(B::Wire, B::Wire)>, TranscriptError>
    where
        B: CircuitBuilder<F>,
    {
        let shape = &self.commitments[round];
        let index_bits =
            replay.next_query_indexes(builder, shape.num_queries, shape.log_leaves)?;

        let opening = &hint.openings[round];
        let batch = MerkleBatch::allocate(builder, &opening.leaves, &opening.paths);
        MerklePathVerifier::new(shape.log_leaves).verify(builder, root, &batch, &index_bits);

        let answers = if round == 0 {
            let expected: Vec<Vec<_>> = hint
                .expected_first_answers
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|&value| builder.private_input(|| value))
                        .collect()
                })
                .collect();
            for (raw, expected) in batch.leaves.iter().zip(&expected) {
                assert_leaf_combination(builder, gammas, raw, expected);
            }
            expected
        } else {
            batch.leaves
        };

        Ok(answers
            .iter()
            .zip(&index_bits)
            .map(|(answer, bits)| {
                let folded = gadgets::evaluate_multilinear(builder, answer, folding_randomness);
                let stir_point = gadgets::exp_by_bits(builder, shape.leaf_generator, bits);
                (stir_point, folded)
            })
            .collect())
    }
}

impl<F> Deref for WhirRoundVerifier<'_, F> {
    type Target = RoundParameters<F>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}
