use itertools::Itertools;
use p3_field::Field;
use p3_maybe_rayon::prelude::*;
use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};
use serde::{Deserialize, Serialize};

use super::multilinear::MultilinearPoint;

const PARALLEL_THRESHOLD: usize = 4096;

/// Represents a multilinear polynomial `f` in `n` variables, stored by its evaluations
/// over the boolean hypercube `{0,1}^n`.
///
/// The inner vector stores function evaluations at points of the hypercube in lexicographic
/// order: the first variable is the most significant bit of the index.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct EvaluationsList<F>(pub(crate) Vec<F>);

impl<F> EvaluationsList<F>
where
    F: Field,
{
    /// # Panics
    /// Panics if `evals.len()` is not a power of two.
    #[inline]
    pub fn new(evals: Vec<F>) -> Self {
        assert!(
            evals.len().is_power_of_two(),
            "Evaluation list length must be a power of two."
        );

        Self(evals)
    }

    pub fn rand<R: Rng>(rng: &mut R, num_variables: usize) -> Self
    where
        StandardUniform: Distribution<F>,
    {
        Self((0..1 << num_variables).map(|_| rng.random()).collect())
    }

    /// Evaluations of `eq(point, ·)` over the hypercube, scaled by `scalar`.
    pub fn eq_table(point: &[F], scalar: F) -> Self {
        let mut evals = Vec::with_capacity(1 << point.len());
        evals.push(scalar);
        for &z in point {
            evals = evals
                .iter()
                .flat_map(|&e| {
                    let hi = e * z;
                    [e - hi, hi]
                })
                .collect();
        }
        Self(evals)
    }

    /// Adds `Σ coeffs[i] · eq(points[i], ·)` to the table.
    pub fn accumulate_batch(&mut self, points: &[MultilinearPoint<F>], coeffs: &[F]) {
        assert_eq!(points.len(), coeffs.len());
        for (point, &coeff) in points.iter().zip(coeffs) {
            let table = Self::eq_table(&point.0, coeff);
            self.0
                .iter_mut()
                .zip_eq(table.0)
                .for_each(|(acc, term)| *acc += term);
        }
    }

    #[must_use]
    pub fn num_evals(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn num_variables(&self) -> usize {
        self.0.len().ilog2() as usize
    }

    #[must_use]
    pub fn as_slice(&self) -> &[F] {
        &self.0
    }

    /// Evaluates the multilinear extension at `point`.
    #[must_use]
    pub fn evaluate(&self, point: &MultilinearPoint<F>) -> F {
        assert_eq!(self.num_variables(), point.num_variables());
        let mut folded = self.clone();
        for &r in &point.0 {
            folded.compress(r);
        }
        folded.0[0]
    }

    /// Fixes the first `k` variables to the big-endian index `a`.
    pub fn restrict_prefix(&self, k: usize, a: usize) -> Self {
        let chunk = self.0.len() >> k;
        Self(self.0[a * chunk..(a + 1) * chunk].to_vec())
    }

    /// Compresses the evaluation list by folding the **first** variable ($X_1$) with a challenge.
    ///
    /// ```text
    /// p(r, x') = p(0, x') + r \cdot (p(1, x') - p(0, x'))
    /// ```
    ///
    /// The first half of the table holds $X_1 = 0$ and the second half $X_1 = 1$.
    #[inline]
    pub fn compress(&mut self, r: F) {
        assert_ne!(self.num_variables(), 0);
        let mid = self.num_evals() / 2;

        let (p0, p1) = self.0.split_at_mut(mid);
        if mid >= PARALLEL_THRESHOLD {
            p0.par_iter_mut()
                .zip(p1.par_iter())
                .for_each(|(a0, &a1)| *a0 += r * (a1 - *a0));
        } else {
            p0.iter_mut()
                .zip(p1.iter())
                .for_each(|(a0, &a1)| *a0 += r * (a1 - *a0));
        }
        self.0.truncate(mid);
    }

    /// `Σ_j coeffs[j] · lists[j]`, entry by entry.
    pub fn linear_combination(lists: &[Self], coeffs: &[F]) -> Self {
        assert_eq!(lists.len(), coeffs.len());
        assert!(!lists.is_empty());
        let mut out = vec![F::ZERO; lists[0].num_evals()];
        for (list, &coeff) in lists.iter().zip(coeffs) {
            assert_eq!(list.num_evals(), out.len());
            out.iter_mut()
                .zip(&list.0)
                .for_each(|(acc, &v)| *acc += coeff * v);
        }
        Self(out)
    }
}
