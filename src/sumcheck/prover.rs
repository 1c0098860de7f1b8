use p3_field::{Field, PrimeField64};

use crate::{
    fiat_shamir::prover::ProverState,
    poly::{evals::EvaluationsList, multilinear::MultilinearPoint},
};

/// Native sumcheck prover for `Σ_x p(x) · w(x)`, where `w` accumulates weighted equality
/// constraints.
///
/// Each round binds the first remaining variable: the evaluation tables are folded by halves.
#[derive(Debug, Clone)]
pub struct SumcheckProver<F> {
    evals: EvaluationsList<F>,
    weights: EvaluationsList<F>,
    sum: F,
}

impl<F: Field> SumcheckProver<F> {
    pub fn new(evals: EvaluationsList<F>, weights: EvaluationsList<F>, sum: F) -> Self {
        assert_eq!(evals.num_evals(), weights.num_evals());
        Self {
            evals,
            weights,
            sum,
        }
    }

    /// Adds `Σ coeffs[i] · eq(points[i], ·)` to the weights and `Σ coeffs[i] · values[i]` to
    /// the claimed sum.
    pub fn add_constraints(&mut self, points: &[MultilinearPoint<F>], coeffs: &[F], values: &[F]) {
        assert_eq!(points.len(), values.len());
        self.weights.accumulate_batch(points, coeffs);
        self.sum += coeffs.iter().zip(values).map(|(&c, &v)| c * v).sum::<F>();
    }

    pub const fn evals(&self) -> &EvaluationsList<F> {
        &self.evals
    }

    pub const fn weights(&self) -> &EvaluationsList<F> {
        &self.weights
    }

    pub const fn sum(&self) -> F {
        self.sum
    }

    /// `[h(0), h(1), h(2)]` for the first remaining variable.
    pub fn round_polynomial(&self) -> [F; 3] {
        let mid = self.evals.num_evals() / 2;
        let (lo, hi) = self.evals.as_slice().split_at(mid);
        let (w_lo, w_hi) = self.weights.as_slice().split_at(mid);

        lo.iter()
            .zip(hi)
            .zip(w_lo.iter().zip(w_hi))
            .fold([F::ZERO; 3], |acc, ((&p0, &p1), (&w0, &w1))| {
                let p2 = p1.double() - p0;
                let w2 = w1.double() - w0;
                [acc[0] + p0 * w0, acc[1] + p1 * w1, acc[2] + p2 * w2]
            })
    }

    /// Folds both tables at `r` and moves the claimed sum to `h(r)`.
    pub fn fold(&mut self, round_polynomial: [F; 3], r: F) {
        self.sum = super::lagrange::extrapolate_012(round_polynomial, r);
        self.evals.compress(r);
        self.weights.compress(r);
    }

    /// Runs `rounds` rounds against the transcript and returns the folding challenges.
    pub fn compute_sumcheck_rounds(
        &mut self,
        prover_state: &mut ProverState,
        rounds: usize,
        pow_bits: usize,
    ) -> Vec<F>
    where
        F: PrimeField64,
    {
        (0..rounds)
            .map(|_| {
                let round_polynomial = self.round_polynomial();
                prover_state.add_scalars(&round_polynomial);
                let r = prover_state.challenge_scalar::<F>();
                prover_state.challenge_pow(pow_bits);
                self.fold(round_polynomial, r);
                r
            })
            .collect()
    }
}
