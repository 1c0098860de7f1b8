use core::{iter, ops::Deref};

use p3_dft::TwoAdicSubgroupDft;
use p3_field::{PrimeField64, TwoAdicField};
use p3_matrix::{Matrix, dense::RowMajorMatrix};
use tracing::{info_span, instrument};

use super::Witness;
use crate::{
    fiat_shamir::prover::ProverState,
    merkle_tree::MerkleTree,
    poly::{coeffs::CoefficientList, evals::EvaluationsList, multilinear::MultilinearPoint},
    whir::parameters::{CommitmentShape, RoundParameters},
};

/// Commits batches of polynomials for the reference prover.
#[derive(Debug)]
pub struct CommitmentWriter<'a, F>(&'a RoundParameters<F>);

impl<'a, F> CommitmentWriter<'a, F>
where
    F: PrimeField64 + TwoAdicField,
{
    pub const fn new(params: &'a RoundParameters<F>) -> Self {
        Self(params)
    }

    /// Encodes and commits `polynomials`, then answers the commitment's OOD queries.
    ///
    /// Absorbs the Merkle root, squeezes the OOD points and absorbs `batch_size` answers per
    /// point.
    #[instrument(skip_all, fields(num_variables = self.num_variables, batch_size = polynomials.len()))]
    pub fn commit<Dft: TwoAdicSubgroupDft<F>>(
        &self,
        dft: &Dft,
        prover_state: &mut ProverState,
        polynomials: Vec<EvaluationsList<F>>,
    ) -> Witness<F> {
        assert_eq!(polynomials.len(), self.batch_size);
        let leaves = info_span!("encode leaves")
            .in_scope(|| encode_leaves(dft, &polynomials, &self.commitments[0]));
        let tree = MerkleTree::new(&leaves);
        prover_state.add_digest(&tree.root());

        let (ood_points, ood_answers) =
            sample_ood(prover_state, &polynomials, self.commitment_ood_samples);

        Witness {
            polynomials,
            leaves,
            tree,
            ood_points,
            ood_answers,
        }
    }
}

impl<F> Deref for CommitmentWriter<'_, F> {
    type Target = RoundParameters<F>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

/// Leaf `i` holds, for every polynomial `p` of the batch and every `a < 2^k`,
/// `p_a(expand(x))` at `x = leaf_generator^i`, where `p_a` fixes the first `k` variables of `p`
/// to the big-endian index `a`.
///
/// The coefficients of every `p_a` form one column of a zero-padded matrix with a row per leaf,
/// so all leaves come out of a single batched DFT over the subgroup of order `2^log_leaves`.
pub fn encode_leaves<F, Dft>(
    dft: &Dft,
    polynomials: &[EvaluationsList<F>],
    shape: &CommitmentShape<F>,
) -> Vec<Vec<F>>
where
    F: PrimeField64 + TwoAdicField,
    Dft: TwoAdicSubgroupDft<F>,
{
    let folding_factor = shape.folding_factor;
    let width = polynomials.len() << folding_factor;
    let height = shape.num_leaves();

    let mut values = vec![F::ZERO; height * width];
    let restrictions = polynomials.iter().flat_map(|poly| {
        (0..1 << folding_factor)
            .map(move |a| CoefficientList::from(&poly.restrict_prefix(folding_factor, a)))
    });
    for (column, restriction) in restrictions.enumerate() {
        debug_assert!(restriction.as_slice().len() <= height);
        for (row, &coeff) in restriction.as_slice().iter().enumerate() {
            values[row * width + column] = coeff;
        }
    }

    let evaluations = info_span!("dft", height, width).in_scope(|| {
        dft.dft_batch(RowMajorMatrix::new(values, width))
            .to_row_major_matrix()
    });

    // The DFT evaluates at powers of the canonical generator; a configured generator `ω^j`
    // reads row `i·j` for leaf `i`.
    let stride = subgroup_exponent(shape.leaf_generator, shape.log_leaves);
    (0..height)
        .map(|i| {
            let row = (i * stride) & (height - 1);
            evaluations.values[row * width..(row + 1) * width].to_vec()
        })
        .collect()
}

/// The exponent `j` with `generator == ω^j`, where `ω` is the canonical generator of order
/// `2^log_size`.
fn subgroup_exponent<F: TwoAdicField>(generator: F, log_size: usize) -> usize {
    let canonical = F::two_adic_generator(log_size);
    if generator == canonical {
        return 1;
    }
    iter::successors(Some(F::ONE), |&power| Some(power * canonical))
        .take(1 << log_size)
        .position(|power| power == generator)
        .unwrap_or_else(|| unreachable!("validated leaf generators lie in the two-adic subgroup"))
}

/// Squeezes `num_samples` OOD points and absorbs every polynomial's value at each of them.
pub fn sample_ood<F>(
    prover_state: &mut ProverState,
    polynomials: &[EvaluationsList<F>],
    num_samples: usize,
) -> (Vec<F>, Vec<F>)
where
    F: PrimeField64 + TwoAdicField,
{
    if num_samples == 0 {
        return (Vec::new(), Vec::new());
    }
    let points = prover_state.challenge_scalars::<F>(num_samples);
    let answers: Vec<F> = points
        .iter()
        .flat_map(|&point| {
            polynomials.iter().map(move |poly| {
                poly.evaluate(&MultilinearPoint::expand_from_univariate(
                    point,
                    poly.num_variables(),
                ))
            })
        })
        .collect();
    prover_state.add_scalars(&answers);
    (points, answers)
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_dft::Radix2DFTSmallBatch;
    use p3_field::PrimeCharacteristicRing;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        constant::DEFAULT_SESSION,
        crypto::field::Fp256,
        fiat_shamir::domain_separator::DomainSeparator,
        whir::parameters::WhirConfig,
    };

    type F = BabyBear;

    #[test]
    fn test_leaves_fold_to_the_restricted_polynomial() {
        let params =
            RoundParameters::<F>::new(&WhirConfig::with_default_domain::<F>(6, 1, vec![2, 2], 2, 0, 1))
                .unwrap();
        let shape = &params.commitments[0];
        let mut rng = StdRng::seed_from_u64(0);
        let poly = EvaluationsList::<F>::rand(&mut rng, 6);
        let leaves = encode_leaves(&Radix2DFTSmallBatch::<F>::default(), &[poly.clone()], shape);
        assert_eq!(leaves.len(), 1 << shape.log_leaves);

        // Folding a leaf at r gives the polynomial with its first two variables bound to r.
        let r = MultilinearPoint::<F>::rand(&mut rng, 2);
        let mut folded = poly.clone();
        for &ri in &r.0 {
            folded.compress(ri);
        }
        for i in [0, 3, 17] {
            let x = shape.leaf_generator.exp_u64(i);
            let leaf = EvaluationsList::new(leaves[i as usize].clone());
            assert_eq!(
                leaf.evaluate(&r),
                folded.evaluate(&MultilinearPoint::expand_from_univariate(x, 4))
            );
        }
    }

    #[test]
    fn test_batched_leaves_are_polynomial_major() {
        let params =
            RoundParameters::<F>::new(&WhirConfig::with_default_domain::<F>(4, 1, vec![1, 1], 2, 0, 2))
                .unwrap();
        let shape = &params.commitments[0];
        let first = EvaluationsList::new((0..16).map(F::from_u32).collect());
        let second = EvaluationsList::new(vec![F::ONE; 16]);
        let leaves =
            encode_leaves(&Radix2DFTSmallBatch::<F>::default(), &[first.clone(), second], shape);
        assert_eq!(leaves[0].len(), 4);
        // at x = 1 every restriction evaluates to the sum of its coefficients, i.e. its value
        // at the all-ones point
        assert_eq!(leaves[0][0], F::from_u32(7));
        assert_eq!(leaves[0][1], F::from_u32(15));
        assert_eq!(leaves[0][2], F::ONE);
        assert_eq!(leaves[0][3], F::ONE);
    }

    #[test]
    fn test_commit_absorbs_root_and_ood() {
        let params =
            RoundParameters::<F>::new(&WhirConfig::with_default_domain::<F>(6, 1, vec![2, 2], 2, 0, 1))
                .unwrap();
        let mut pattern = DomainSeparator::new(DEFAULT_SESSION);
        pattern.add_whir_commitment(&params);
        let mut prover_state = ProverState::new(&pattern).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let poly = EvaluationsList::<F>::rand(&mut rng, 6);
        let witness = CommitmentWriter::new(&params).commit(
            &Radix2DFTSmallBatch::<F>::default(),
            &mut prover_state,
            vec![poly.clone()],
        );

        assert_eq!(witness.ood_points.len(), 1);
        assert_eq!(
            witness.ood_answers[0],
            poly.evaluate(&MultilinearPoint::expand_from_univariate(witness.ood_points[0], 6))
        );
        assert_eq!(&prover_state.narg_string()[..32], witness.tree.root().as_bytes());
        assert_eq!(prover_state.narg_string().len(), 32 + 4);
    }

    #[test]
    fn test_dft_encoding_matches_direct_evaluation() {
        let dft = Radix2DFTSmallBatch::<F>::default();
        let mut rng = StdRng::seed_from_u64(2);
        let polys = vec![EvaluationsList::<F>::rand(&mut rng, 7), EvaluationsList::<F>::rand(&mut rng, 7)];

        // the canonical generator, then one of the same order that is not canonical
        let mut config = WhirConfig::with_default_domain::<F>(7, 2, vec![3, 2], 2, 0, 2);
        let canonical = F::two_adic_generator(9);
        for generator in [canonical, canonical.exp_u64(5)] {
            config.domain_generator = Fp256::from_field(generator);
            let params = RoundParameters::<F>::new(&config).unwrap();
            let shape = &params.commitments[0];
            let leaves = encode_leaves(&dft, &polys, shape);

            for i in [0, 1, 5, 63] {
                let x = shape.leaf_generator.exp_u64(i as u64);
                let expected: Vec<F> = polys
                    .iter()
                    .flat_map(|poly| {
                        (0..8).map(move |a| {
                            CoefficientList::from(&poly.restrict_prefix(3, a)).evaluate_at_univariate(x)
                        })
                    })
                    .collect();
                assert_eq!(leaves[i], expected);
            }
        }
    }
}
