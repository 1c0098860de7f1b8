//! Reference prover.
//!
//! Produces the transcript, configuration and hints the recursive verifier consumes. It runs
//! the exact interaction sequence of [`DomainSeparator::add_recursion_protocol`], so anything
//! it emits replays cleanly inside the circuit.

use core::ops::Deref;

use p3_dft::{Radix2DFTSmallBatch, TwoAdicSubgroupDft};
use p3_field::{Field, PrimeCharacteristicRing, PrimeField64, TwoAdicField};
use tracing::{debug, info, instrument};

use super::{
    committer::{
        Witness,
        writer::{CommitmentWriter, encode_leaves, sample_ood},
    },
    hints::{Configuration, Hints, ProofObject, ZkHint},
    parameters::{RoundParameters, WhirConfig},
};
use crate::{
    constant::DEFAULT_SESSION,
    crypto::field::Fp256,
    errors::{ConfigError, RecursionError},
    fiat_shamir::{domain_separator::DomainSeparator, prover::ProverState},
    merkle_tree::MerkleTree,
    poly::{evals::EvaluationsList, multilinear::MultilinearPoint},
    sumcheck::prover::SumcheckProver,
};

/// Proves openings of one committed batch.
#[derive(Debug)]
pub struct Prover<'a, F>(&'a RoundParameters<F>);

/// What one opening proof leaves behind besides the transcript.
#[derive(Debug, Clone)]
pub struct InstanceProof<F> {
    pub hint: ZkHint,
    /// `(1, γ, ..., γ^(B-1))`.
    pub batching: Vec<F>,
}

/// Mutable state carried from one round to the next.
struct RoundState<'w, F: PrimeField64> {
    sumcheck: SumcheckProver<F>,
    folding_randomness: Vec<F>,
    batching: Vec<F>,
    witness: &'w Witness<F>,
    /// Tree and leaves of the latest round commitment; `None` before the first round.
    committed: Option<(MerkleTree, Vec<Vec<F>>)>,
    hint: ZkHint,
}

impl<'a, F> Prover<'a, F>
where
    F: PrimeField64 + TwoAdicField,
{
    pub const fn new(params: &'a RoundParameters<F>) -> Self {
        Self(params)
    }

    /// Proves that the batch in `witness`, combined under fresh batching randomness, opens at
    /// `statement_point` to the same combination of `statement_values`.
    #[instrument(skip_all, fields(num_variables = self.num_variables, num_rounds = self.num_rounds))]
    pub fn prove<Dft: TwoAdicSubgroupDft<F>>(
        &self,
        dft: &Dft,
        prover_state: &mut ProverState,
        witness: &Witness<F>,
        statement_point: &MultilinearPoint<F>,
        statement_values: &[F],
    ) -> InstanceProof<F> {
        self.prove_shifting_final(
            dft,
            prover_state,
            witness,
            statement_point,
            statement_values,
            F::ZERO,
        )
    }

    /// Like [`Self::prove`], but adds `final_shift` to every final evaluation it sends while
    /// opening and folding honestly. A non-zero shift makes a proof that passes every Merkle
    /// check and fails the final fold.
    pub(crate) fn prove_shifting_final<Dft: TwoAdicSubgroupDft<F>>(
        &self,
        dft: &Dft,
        prover_state: &mut ProverState,
        witness: &Witness<F>,
        statement_point: &MultilinearPoint<F>,
        statement_values: &[F],
        final_shift: F,
    ) -> InstanceProof<F> {
        assert_eq!(statement_point.num_variables(), self.num_variables);
        assert_eq!(statement_values.len(), self.batch_size);

        let batching = if self.batch_size > 1 {
            powers(prover_state.challenge_scalar::<F>(), self.batch_size)
        } else {
            vec![F::ONE]
        };

        let combined = EvaluationsList::linear_combination(&witness.polynomials, &batching);
        let mut sumcheck = SumcheckProver::new(
            combined,
            EvaluationsList::new(vec![F::ZERO; 1 << self.num_variables]),
            F::ZERO,
        );

        let mut points: Vec<_> = witness
            .ood_points
            .iter()
            .map(|&point| MultilinearPoint::expand_from_univariate(point, self.num_variables))
            .collect();
        let mut values: Vec<_> = witness
            .ood_answers
            .chunks_exact(self.batch_size)
            .map(|answers| inner_product(&batching, answers))
            .collect();
        points.push(statement_point.clone());
        values.push(inner_product(&batching, statement_values));

        let alpha = prover_state.challenge_scalar::<F>();
        sumcheck.add_constraints(&points, &powers(alpha, points.len()), &values);
        let folding_randomness =
            sumcheck.compute_sumcheck_rounds(prover_state, self.commitments[0].folding_factor, 0);

        let mut state = RoundState {
            sumcheck,
            folding_randomness,
            batching,
            witness,
            committed: None,
            hint: ZkHint::default(),
        };

        for round in 0..self.num_rounds {
            self.round(dft, prover_state, &mut state, round);
            debug!(round, "round proved");
        }
        self.final_round(prover_state, &mut state, final_shift);

        InstanceProof {
            hint: state.hint,
            batching: state.batching,
        }
    }

    /// Commits the folded polynomial, opens the previous commitment and folds further.
    fn round<Dft: TwoAdicSubgroupDft<F>>(
        &self,
        dft: &Dft,
        prover_state: &mut ProverState,
        state: &mut RoundState<'_, F>,
        round: usize,
    ) {
        let next = &self.commitments[round + 1];
        let folded = state.sumcheck.evals().clone();

        let leaves = encode_leaves(dft, core::slice::from_ref(&folded), next);
        let tree = MerkleTree::new(&leaves);
        prover_state.add_digest(&tree.root());
        let (ood_points, ood_answers) =
            sample_ood(prover_state, core::slice::from_ref(&folded), next.ood_samples);

        let stir = self.open_commitment(prover_state, state, round);
        state.committed = Some((tree, leaves));

        let (mut points, mut values): (Vec<_>, Vec<_>) = ood_points
            .into_iter()
            .map(|point| MultilinearPoint::expand_from_univariate(point, next.num_variables))
            .zip(ood_answers)
            .unzip();
        for (stir_point, value) in stir {
            points.push(MultilinearPoint::expand_from_univariate(
                stir_point,
                next.num_variables,
            ));
            values.push(value);
        }

        let alpha = prover_state.challenge_scalar::<F>();
        state
            .sumcheck
            .add_constraints(&points, &powers(alpha, points.len()), &values);
        state.folding_randomness =
            state
                .sumcheck
                .compute_sumcheck_rounds(prover_state, next.folding_factor, 0);
    }

    /// Sends the final polynomial, opens the last commitment and runs the final sumcheck.
    fn final_round(
        &self,
        prover_state: &mut ProverState,
        state: &mut RoundState<'_, F>,
        final_shift: F,
    ) {
        let final_evaluations = state.sumcheck.evals().clone();
        let sent: Vec<F> = final_evaluations
            .as_slice()
            .iter()
            .map(|&value| value + final_shift)
            .collect();
        prover_state.add_scalars(&sent);

        let stir = self.open_commitment(prover_state, state, self.num_rounds);
        debug_assert!(stir.iter().all(|&(point, value)| {
            final_evaluations.evaluate(&MultilinearPoint::expand_from_univariate(
                point,
                self.final_sumcheck_rounds,
            )) == value
        }));

        state.sumcheck.compute_sumcheck_rounds(
            prover_state,
            self.final_sumcheck_rounds,
            self.final_folding_pow_bits,
        );
    }

    /// Grinds, squeezes the query indexes and opens commitment `round` at them.
    ///
    /// Records the opening in the hint and returns `(leaf_generator^index, folded value)` for
    /// every query.
    fn open_commitment(
        &self,
        prover_state: &mut ProverState,
        state: &mut RoundState<'_, F>,
        round: usize,
    ) -> Vec<(F, F)> {
        let shape = &self.commitments[round];
        prover_state.challenge_pow(shape.pow_bits);
        let indexes = prover_state.challenge_indexes(shape.num_queries, shape.log_leaves);

        let (tree, leaves) = match &state.committed {
            Some((tree, leaves)) => (tree, leaves),
            None => (&state.witness.tree, &state.witness.leaves),
        };
        let merkle_path = tree.open_multi(&indexes);
        let raw: Vec<Vec<F>> = indexes.iter().map(|&index| leaves[index].clone()).collect();

        let answers: Vec<Vec<F>> = if round == 0 {
            raw.iter()
                .map(|leaf| combine_leaf(leaf, &state.batching))
                .collect()
        } else {
            raw.clone()
        };

        if round == 0 {
            let first = &mut state.hint.first_round;
            first.path.merkle_paths.push(merkle_path);
            first.path.stir_answers.push(to_transport(&raw));
            first.expected_stir_answers = to_transport(&answers);
        } else {
            let rounds = &mut state.hint.round_hints;
            rounds.merkle_paths.push(merkle_path);
            rounds.stir_answers.push(to_transport(&raw));
        }

        let folding_point = MultilinearPoint(state.folding_randomness.clone());
        answers
            .into_iter()
            .zip(indexes)
            .map(|(answer, index)| {
                let folded = EvaluationsList::new(answer).evaluate(&folding_point);
                (shape.leaf_generator.exp_u64(index as u64), folded)
            })
            .collect()
    }
}

impl<F> Deref for Prover<'_, F> {
    type Target = RoundParameters<F>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

/// Everything [`prove_recursion`] produces.
#[derive(Debug, Clone)]
pub struct ProverOutput<F> {
    pub configuration: Configuration,
    pub hints: Hints,
    pub proof: ProofObject,
    pub witness_point: MultilinearPoint<F>,
    pub hiding_point: MultilinearPoint<F>,
    pub witness_batching: Vec<F>,
    pub hiding_batching: Vec<F>,
}

/// Commits both batches, draws the shared statement and proves both openings.
///
/// The statement values are `S_j = F_j + ρ · G_j`, where `F_j` and `G_j` are the witness and
/// hiding polynomials evaluated at their statement points.
#[instrument(skip_all, fields(witness_variables = witness_config.n_vars, hiding_variables = hiding_config.n_vars))]
pub fn prove_recursion<F>(
    witness_config: &WhirConfig,
    hiding_config: &WhirConfig,
    witness_polynomials: Vec<EvaluationsList<F>>,
    hiding_polynomials: Vec<EvaluationsList<F>>,
) -> Result<ProverOutput<F>, RecursionError>
where
    F: PrimeField64 + TwoAdicField,
{
    let witness_params = RoundParameters::<F>::new(witness_config)?;
    let hiding_params = RoundParameters::<F>::new(hiding_config)?;
    if witness_params.batch_size != hiding_params.batch_size {
        return Err(ConfigError::BatchSizeMismatch {
            witness: witness_params.batch_size,
            hiding: hiding_params.batch_size,
        }
        .into());
    }
    check_polynomials("witness", &witness_params, &witness_polynomials)?;
    check_polynomials("hiding", &hiding_params, &hiding_polynomials)?;

    let mut domain_separator = DomainSeparator::new(DEFAULT_SESSION);
    domain_separator.add_recursion_protocol(&witness_params, &hiding_params);
    let mut prover_state = ProverState::new(&domain_separator)?;

    let dft = Radix2DFTSmallBatch::<F>::default();
    let witness =
        CommitmentWriter::new(&witness_params).commit(&dft, &mut prover_state, witness_polynomials);
    let hiding =
        CommitmentWriter::new(&hiding_params).commit(&dft, &mut prover_state, hiding_polynomials);

    let witness_point = MultilinearPoint(
        prover_state.challenge_scalars::<F>(witness_params.num_variables),
    );
    let hiding_point = MultilinearPoint(
        prover_state.challenge_scalars::<F>(hiding_params.num_variables),
    );
    let f_sums: Vec<F> = witness
        .polynomials
        .iter()
        .map(|poly| poly.evaluate(&witness_point))
        .collect();
    let g_sums: Vec<F> = hiding
        .polynomials
        .iter()
        .map(|poly| poly.evaluate(&hiding_point))
        .collect();
    prover_state.add_scalars(&f_sums);
    prover_state.add_scalars(&g_sums);
    let rho = prover_state.challenge_scalar::<F>();

    let witness_proof = Prover::new(&witness_params).prove(
        &dft,
        &mut prover_state,
        &witness,
        &witness_point,
        &f_sums,
    );
    let hiding_proof =
        Prover::new(&hiding_params).prove(&dft, &mut prover_state, &hiding, &hiding_point, &g_sums);

    let statement_values = f_sums
        .iter()
        .zip(&g_sums)
        .map(|(&f, &g)| Fp256::from_field(f + rho * g))
        .collect();

    let transcript = prover_state.into_narg_string();
    info!(transcript_bytes = transcript.len(), "recursion proof generated");

    Ok(ProverOutput {
        configuration: Configuration {
            witness: witness_config.clone(),
            hiding: hiding_config.clone(),
            log_num_constraints: hiding_params.num_variables,
            log_num_variables: witness_params.num_variables,
            log_a_num_terms: 0,
            io_pattern: domain_separator.as_str().to_string(),
            transcript_len: transcript.len(),
            transcript,
            witness_statement_evaluations: f_sums.iter().map(ToString::to_string).collect(),
            blinding_statement_evaluations: g_sums.iter().map(ToString::to_string).collect(),
        },
        hints: Hints {
            witness: witness_proof.hint,
            hiding: hiding_proof.hint,
        },
        proof: ProofObject {
            statement_values_at_random_point: statement_values,
        },
        witness_point,
        hiding_point,
        witness_batching: witness_proof.batching,
        hiding_batching: hiding_proof.batching,
    })
}

fn check_polynomials<F>(
    instance: &str,
    params: &RoundParameters<F>,
    polynomials: &[EvaluationsList<F>],
) -> Result<(), ConfigError>
where
    F: PrimeField64 + TwoAdicField,
{
    if polynomials.len() != params.batch_size {
        return Err(ConfigError::HintShape {
            what: format!("{instance} polynomials"),
            expected: params.batch_size,
            actual: polynomials.len(),
        });
    }
    match polynomials
        .iter()
        .find(|poly| poly.num_variables() != params.num_variables)
    {
        Some(poly) => Err(ConfigError::ProblemSize {
            what: "polynomial variables",
            expected: params.num_variables,
            actual: poly.num_variables(),
        }),
        None => Ok(()),
    }
}

fn powers<F: Field>(base: F, n: usize) -> Vec<F> {
    base.powers().collect_n(n)
}

fn inner_product<F: PrimeCharacteristicRing + Copy>(lhs: &[F], rhs: &[F]) -> F {
    lhs.iter().zip(rhs).map(|(&l, &r)| l * r).sum()
}

/// `Σ_j γ^j · leaf[j · 2^k + a]` for every `a`, on a polynomial-major leaf.
fn combine_leaf<F: PrimeCharacteristicRing + Copy>(leaf: &[F], batching: &[F]) -> Vec<F> {
    let width = leaf.len() / batching.len();
    (0..width)
        .map(|a| {
            batching
                .iter()
                .enumerate()
                .map(|(j, &gamma)| gamma * leaf[j * width + a])
                .sum()
        })
        .collect()
}

fn to_transport<F: PrimeField64>(rows: &[Vec<F>]) -> Vec<Vec<Fp256>> {
    rows.iter()
        .map(|row| row.iter().map(|&value| Fp256::from_field(value)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    type F = BabyBear;

    #[test]
    fn test_combine_leaf_is_polynomial_major() {
        let leaf: Vec<F> = (1..=6).map(F::from_u32).collect();
        let batching = vec![F::ONE, F::TWO];
        assert_eq!(
            combine_leaf(&leaf, &batching),
            vec![F::from_u32(1 + 2 * 4), F::from_u32(2 + 2 * 5), F::from_u32(3 + 2 * 6)]
        );
    }

    #[test]
    fn test_hint_shapes_match_parameters() {
        let mut rng = StdRng::seed_from_u64(7);
        let witness_config = WhirConfig::with_default_domain::<F>(8, 1, vec![2, 3, 2], 3, 0, 2);
        let hiding_config = WhirConfig::with_default_domain::<F>(6, 1, vec![3, 2], 2, 0, 2);
        let witness_polys = (0..2).map(|_| EvaluationsList::rand(&mut rng, 8)).collect();
        let hiding_polys = (0..2).map(|_| EvaluationsList::rand(&mut rng, 6)).collect();

        let output =
            prove_recursion::<F>(&witness_config, &hiding_config, witness_polys, hiding_polys)
                .unwrap();
        let witness_params = RoundParameters::<F>::new(&witness_config).unwrap();
        let hiding_params = RoundParameters::<F>::new(&hiding_config).unwrap();
        output.hints.witness.parse(&witness_params, "witness").unwrap();
        output.hints.hiding.parse(&hiding_params, "hiding").unwrap();
        assert_eq!(output.witness_batching.len(), 2);
        assert_eq!(output.witness_batching[0], F::ONE);
        assert_eq!(
            output.configuration.transcript.len(),
            output.configuration.transcript_len
        );
    }

    #[test]
    fn test_batch_size_mismatch_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let witness_config = WhirConfig::with_default_domain::<F>(6, 1, vec![2, 2], 2, 0, 1);
        let hiding_config = WhirConfig::with_default_domain::<F>(6, 1, vec![2, 2], 2, 0, 2);
        let result = prove_recursion::<F>(
            &witness_config,
            &hiding_config,
            vec![EvaluationsList::rand(&mut rng, 6)],
            (0..2).map(|_| EvaluationsList::rand(&mut rng, 6)).collect(),
        );
        assert_eq!(
            result.unwrap_err(),
            RecursionError::Config(ConfigError::BatchSizeMismatch {
                witness: 1,
                hiding: 2
            })
        );
    }
}
