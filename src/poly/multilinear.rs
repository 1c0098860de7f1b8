use p3_field::Field;
use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};

/// Point (x_1,..., x_n) in F^n for some n.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultilinearPoint<F>(pub Vec<F>);

impl<F> MultilinearPoint<F>
where
    F: Field,
{
    /// returns the number of variables.
    pub fn num_variables(&self) -> usize {
        self.0.len()
    }

    /// converts a univariate evaluation point into a multilinear one.
    ///
    /// Consider the usual bijection
    /// {multilinear polys in n variables} <-> {univariate polys of deg < 2^n}
    /// f(x_1,...x_n)  <-> g(y) := f(y^(2^(n-1), ..., y^4, y^2, y).
    /// x_1^i_1 * ... *x_n^i_n <-> y^i, where (i_1,...,i_n) is the (big-endian) binary decomposition
    /// of i.
    ///
    /// expand_from_univariate maps the evaluation points to the multivariate domain, i.e.
    /// f(expand_from_univariate(y)) == g(y).
    pub fn expand_from_univariate(point: F, num_variables: usize) -> Self {
        let mut res = Vec::with_capacity(num_variables);
        let mut cur = point;
        for _ in 0..num_variables {
            res.push(cur);
            cur = cur.square();
        }

        // Reverse so higher power is first
        res.reverse();

        Self(res)
    }

    /// Compute eq(coords, point) for an arbitrary (not necessarily binary) point.
    ///
    /// eq(c, p) = \prod_i c_i * p_i + (1 - c_i) * (1 - p_i).
    pub fn eq_poly_outside(&self, point: &Self) -> F {
        assert_eq!(self.num_variables(), point.num_variables());

        self.0
            .iter()
            .zip(&point.0)
            .map(|(&l, &r)| l * r + (F::ONE - l) * (F::ONE - r))
            .product()
    }

    pub fn rand<R: Rng>(rng: &mut R, num_variables: usize) -> Self
    where
        StandardUniform: Distribution<F>,
    {
        Self((0..num_variables).map(|_| rng.random()).collect())
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;

    type F = BabyBear;

    #[test]
    fn test_expand_from_univariate() {
        let y = F::from_u32(3);
        let point = MultilinearPoint::expand_from_univariate(y, 3);
        assert_eq!(
            point.0,
            vec![F::from_u32(81), F::from_u32(9), F::from_u32(3)]
        );
        assert!(MultilinearPoint::expand_from_univariate(y, 0).0.is_empty());
    }

    #[test]
    fn test_eq_poly_outside_on_hypercube() {
        let a = MultilinearPoint(vec![F::ONE, F::ZERO]);
        let b = MultilinearPoint(vec![F::ONE, F::ONE]);
        assert_eq!(a.eq_poly_outside(&a), F::ONE);
        assert_eq!(a.eq_poly_outside(&b), F::ZERO);
    }
}
