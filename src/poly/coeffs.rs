use p3_field::Field;

use super::evals::EvaluationsList;

/// A multilinear polynomial `f` in `n` variables, stored by its coefficients.
///
/// The coefficient for the monomial `X_1^{b_1} * ... * X_n^{b_n}` is stored at the index whose
/// big-endian binary representation is `(b_1, ..., b_n)`. With this ordering the coefficient
/// vector is also the coefficient vector of the univariate view `g(y) = f(y^(2^(n-1)), ..., y)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientList<F>(Vec<F>);

impl<F: Field> CoefficientList<F> {
    pub fn new(coeffs: Vec<F>) -> Self {
        assert!(coeffs.len().is_power_of_two());
        Self(coeffs)
    }

    pub fn num_variables(&self) -> usize {
        self.0.len().ilog2() as usize
    }

    pub fn as_slice(&self) -> &[F] {
        &self.0
    }

    /// Evaluate the univariate view at `point` with Horner's rule.
    pub fn evaluate_at_univariate(&self, point: F) -> F {
        self.0.iter().rev().fold(F::ZERO, |acc, &c| acc * point + c)
    }

    /// Convert back to evaluations over the hypercube.
    pub fn to_evaluations(self) -> EvaluationsList<F> {
        let mut evals = self.0;
        // zeta transform, one variable at a time
        let n = evals.len();
        let mut half = 1;
        while half < n {
            for chunk in evals.chunks_exact_mut(2 * half) {
                let (lo, hi) = chunk.split_at_mut(half);
                for (h, &l) in hi.iter_mut().zip(lo.iter()) {
                    *h += l;
                }
            }
            half *= 2;
        }
        EvaluationsList::new(evals)
    }
}

impl<F: Field> From<&EvaluationsList<F>> for CoefficientList<F> {
    /// Möbius transform of the evaluation table.
    fn from(evals: &EvaluationsList<F>) -> Self {
        let mut coeffs = evals.as_slice().to_vec();
        let n = coeffs.len();
        let mut half = 1;
        while half < n {
            for chunk in coeffs.chunks_exact_mut(2 * half) {
                let (lo, hi) = chunk.split_at_mut(half);
                for (h, &l) in hi.iter_mut().zip(lo.iter()) {
                    *h -= l;
                }
            }
            half *= 2;
        }
        Self(coeffs)
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::poly::multilinear::MultilinearPoint;

    type F = BabyBear;

    proptest! {
        #[test]
        fn prop_univariate_view_matches_expanded_point(seed in any::<u64>(), n in 0usize..6) {
            let mut rng = StdRng::seed_from_u64(seed);
            let evals = EvaluationsList::<F>::rand(&mut rng, n);
            let coeffs = CoefficientList::from(&evals);
            let y: F = MultilinearPoint::rand(&mut rng, 1).0[0];

            prop_assert_eq!(
                coeffs.evaluate_at_univariate(y),
                evals.evaluate(&MultilinearPoint::expand_from_univariate(y, n))
            );
            prop_assert_eq!(coeffs.to_evaluations(), evals);
        }
    }
}
