//! Reusable constraint gadgets.
//!
//! Multilinear conventions follow [`crate::poly`]: evaluation tables are indexed with the
//! first variable as the most significant bit.

use std::iter;

use p3_field::PrimeField64;

use super::{Check, CircuitBuilder};

pub fn assert_bit<F, B>(builder: &mut B, bit: B::Wire)
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let squared = builder.mul(bit, bit);
    builder.assert_eq(squared, bit, Check::Boolean);
}

/// `bit ? when_true : when_false`, for a boolean `bit`.
pub fn select<F, B>(builder: &mut B, bit: B::Wire, when_true: B::Wire, when_false: B::Wire) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let diff = builder.sub(when_true, when_false);
    let picked = builder.mul(bit, diff);
    builder.add(when_false, picked)
}

/// `Σ 2^i · bits[i]`.
pub fn pack_bits<F, B>(builder: &mut B, bits: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    horner(builder, bits.iter().rev().copied(), F::TWO)
}

/// Little-endian bits of a byte wire.
///
/// Each bit is constrained to be boolean and the bits must recompose to `byte`, which also
/// forces `byte < 256`.
pub fn decompose_byte<F, B>(builder: &mut B, byte: B::Wire) -> [B::Wire; 8]
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let bits = builder.hint::<_, 1, 8>([byte], |[value]| {
        let value = value.as_canonical_u64();
        core::array::from_fn(|i| F::from_bool((value >> i) & 1 == 1))
    });
    for &bit in &bits {
        assert_bit(builder, bit);
    }
    let packed = pack_bits(builder, &bits);
    builder.assert_eq(packed, byte, Check::Range);
    bits
}

/// Little-endian byte wires as an integer reduced modulo `p`.
pub fn from_le_bytes<F, B>(builder: &mut B, bytes: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    horner(builder, bytes.iter().rev().copied(), F::from_u16(256))
}

/// Big-endian byte wires as an integer reduced modulo `p`.
pub fn from_be_bytes<F, B>(builder: &mut B, bytes: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    horner(builder, bytes.iter().copied(), F::from_u16(256))
}

/// Horner evaluation with a constant radix, most significant digit first.
fn horner<F, B>(builder: &mut B, mut digits: impl Iterator<Item = B::Wire>, radix: F) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let Some(first) = digits.next() else {
        return builder.zero();
    };
    digits.fold(first, |acc, digit| {
        let shifted = builder.mul_const(acc, radix);
        builder.add(shifted, digit)
    })
}

pub fn sum<F, B>(builder: &mut B, terms: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let Some((&first, rest)) = terms.split_first() else {
        return builder.zero();
    };
    rest.iter().fold(first, |acc, &term| builder.add(acc, term))
}

pub fn inner_product<F, B>(builder: &mut B, lhs: &[B::Wire], rhs: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    assert_eq!(lhs.len(), rhs.len());
    let products: Vec<_> = iter::zip(lhs, rhs)
        .map(|(&a, &b)| builder.mul(a, b))
        .collect();
    sum(builder, &products)
}

/// `[1, x, x^2, ..., x^(n-1)]`.
pub fn powers<F, B>(builder: &mut B, x: B::Wire, n: usize) -> Vec<B::Wire>
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }
    out.push(builder.one());
    for i in 1..n {
        out.push(builder.mul(out[i - 1], x));
    }
    out
}

/// `base^index` where `index` is given by its little-endian bits and `base` is a constant.
pub fn exp_by_bits<F, B>(builder: &mut B, base: F, bits: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let mut acc = builder.one();
    let mut square = base;
    for &bit in bits {
        // 1 + bit · (base^(2^i) - 1)
        let scaled = builder.mul_const(bit, square - F::ONE);
        let factor = builder.add_const(scaled, F::ONE);
        acc = builder.mul(acc, factor);
        square = square.square();
    }
    acc
}

/// `(z^(2^(n-1)), ..., z^2, z)`, the multilinear point at which a polynomial agrees with its
/// univariate view at `z`.
pub fn expand_from_univariate<F, B>(builder: &mut B, z: B::Wire, n: usize) -> Vec<B::Wire>
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let mut out = Vec::with_capacity(n);
    let mut current = z;
    for i in 0..n {
        if i > 0 {
            current = builder.mul(current, current);
        }
        out.push(current);
    }
    out.reverse();
    out
}

/// `eq(x, y) = Π (x_i·y_i + (1 - x_i)(1 - y_i))`.
pub fn eq_eval<F, B>(builder: &mut B, x: &[B::Wire], y: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    assert_eq!(x.len(), y.len());
    let mut acc = builder.one();
    for (&a, &b) in iter::zip(x, y) {
        // 2ab - a - b + 1
        let ab = builder.mul(a, b);
        let two_ab = builder.mul_const(ab, F::TWO);
        let a_plus_b = builder.add(a, b);
        let diff = builder.sub(two_ab, a_plus_b);
        let term = builder.add_const(diff, F::ONE);
        acc = builder.mul(acc, term);
    }
    acc
}

/// Evaluate the multilinear extension of `evals` at `point`, binding the first variable first.
pub fn evaluate_multilinear<F, B>(builder: &mut B, evals: &[B::Wire], point: &[B::Wire]) -> B::Wire
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    assert_eq!(evals.len(), 1 << point.len());
    let folded = point.iter().fold(evals.to_vec(), |current, &coord| {
        let (lo, hi) = current.split_at(current.len() / 2);
        iter::zip(lo, hi)
            .map(|(&lo, &hi)| {
                let diff = builder.sub(hi, lo);
                let scaled = builder.mul(coord, diff);
                builder.add(lo, scaled)
            })
            .collect()
    });
    folded[0]
}

#[cfg(test)]
mod tests {
    use std::array;

    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        circuit::{ConstraintBuilder, WitnessGenerator},
        poly::{evals::EvaluationsList, multilinear::MultilinearPoint},
    };

    type F = BabyBear;

    trait TestCircuit<const N_INOUT: usize> {
        fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; N_INOUT]);
    }

    /// Runs the circuit under both builders and returns the first failed check, if any.
    fn test_helper<C: TestCircuit<N_INOUT>, const N_INOUT: usize>(
        inout_vals: [F; N_INOUT],
    ) -> Option<Check> {
        let mut constraint_builder = ConstraintBuilder::new();
        let inout = array::from_fn(|_| constraint_builder.private_input(|| F::ZERO));
        C::build(&mut constraint_builder, inout);
        let cs = constraint_builder.build();

        let mut witness_gen = WitnessGenerator::new();
        let inout = array::from_fn(|i| witness_gen.private_input(|| inout_vals[i]));
        C::build(&mut witness_gen, inout);
        let first = witness_gen.first_violation();
        let validated = cs.validate(&witness_gen.into_witness());
        assert_eq!(first.is_none(), validated.is_ok());
        first
    }

    #[test]
    fn test_decompose_byte() {
        struct Decompose;

        impl TestCircuit<2> for Decompose {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 2]) {
                let [byte, expected_top] = inout;
                let bits = decompose_byte(builder, byte);
                builder.assert_eq(bits[7], expected_top, Check::Wiring);
            }
        }

        assert_eq!(test_helper::<Decompose, 2>([F::from_u8(0x80), F::ONE]), None);
        assert_eq!(test_helper::<Decompose, 2>([F::from_u8(0x7f), F::ZERO]), None);
        // 256 cannot be written with eight bits.
        assert_eq!(
            test_helper::<Decompose, 2>([F::from_u16(256), F::ZERO]),
            Some(Check::Range)
        );
    }

    #[test]
    fn test_assert_bit_rejects_two() {
        struct Bit;

        impl TestCircuit<1> for Bit {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 1]) {
                assert_bit(builder, inout[0]);
            }
        }

        assert_eq!(test_helper::<Bit, 1>([F::ONE]), None);
        assert_eq!(test_helper::<Bit, 1>([F::TWO]), Some(Check::Boolean));
    }

    #[test]
    fn test_select() {
        struct Select;

        impl TestCircuit<4> for Select {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 4]) {
                let [bit, t, f, expected] = inout;
                let out = select(builder, bit, t, f);
                builder.assert_eq(out, expected, Check::Wiring);
            }
        }

        let (t, f) = (F::from_u32(11), F::from_u32(22));
        assert_eq!(test_helper::<Select, 4>([F::ONE, t, f, t]), None);
        assert_eq!(test_helper::<Select, 4>([F::ZERO, t, f, f]), None);
    }

    #[test]
    fn test_byte_orders() {
        struct Bytes;

        impl TestCircuit<5> for Bytes {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 5]) {
                let [b0, b1, b2, le, be] = inout;
                let got_le = from_le_bytes(builder, &[b0, b1, b2]);
                let got_be = from_be_bytes(builder, &[b0, b1, b2]);
                builder.assert_eq(got_le, le, Check::Wiring);
                builder.assert_eq(got_be, be, Check::Wiring);
            }
        }

        assert_eq!(
            test_helper::<Bytes, 5>([
                F::from_u8(1),
                F::from_u8(2),
                F::from_u8(3),
                F::from_u32(0x0003_0201),
                F::from_u32(0x0001_0203),
            ]),
            None
        );
    }

    #[test]
    fn test_exp_by_bits() {
        struct Exp;

        impl TestCircuit<4> for Exp {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 4]) {
                let [b0, b1, b2, expected] = inout;
                let out = exp_by_bits(builder, F::from_u32(3), &[b0, b1, b2]);
                builder.assert_eq(out, expected, Check::Wiring);
            }
        }

        // index 0b101 = 5
        assert_eq!(
            test_helper::<Exp, 4>([F::ONE, F::ZERO, F::ONE, F::from_u32(243)]),
            None
        );
    }

    #[test]
    fn test_powers_and_inner_product() {
        struct Powers;

        impl TestCircuit<2> for Powers {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 2]) {
                let [x, expected] = inout;
                let pows = powers(builder, x, 4);
                let ones: Vec<_> = (0..4).map(|_| builder.one()).collect();
                let total = inner_product(builder, &pows, &ones);
                builder.assert_eq(total, expected, Check::Wiring);
            }
        }

        // 1 + 2 + 4 + 8
        assert_eq!(test_helper::<Powers, 2>([F::TWO, F::from_u32(15)]), None);
    }

    #[test]
    fn test_multilinear_matches_native() {
        struct Eval;

        impl TestCircuit<12> for Eval {
            fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 12]) {
                let (evals, rest) = inout.split_at(8);
                let (point, expected) = rest.split_at(3);
                let out = evaluate_multilinear(builder, evals, point);
                builder.assert_eq(out, expected[0], Check::Wiring);
            }
        }

        let mut rng = StdRng::seed_from_u64(7);
        let evals: Vec<F> = (0..8).map(|_| rng.random()).collect();
        let point: Vec<F> = (0..3).map(|_| rng.random()).collect();
        let expected =
            EvaluationsList::new(evals.clone()).evaluate(&MultilinearPoint(point.clone()));

        let mut inout = [F::ZERO; 12];
        inout[..8].copy_from_slice(&evals);
        inout[8..11].copy_from_slice(&point);
        inout[11] = expected;
        assert_eq!(test_helper::<Eval, 12>(inout), None);
    }

    proptest! {
        #[test]
        fn prop_expanded_eq_matches_native(z in 0u32..1 << 30, y in 0u32..1 << 30) {
            struct ExpandEq;

            impl TestCircuit<3> for ExpandEq {
                fn build<B: CircuitBuilder<F>>(builder: &mut B, inout: [B::Wire; 3]) {
                    let [z, y, expected] = inout;
                    let zs = expand_from_univariate(builder, z, 3);
                    let ys = expand_from_univariate(builder, y, 3);
                    let out = eq_eval(builder, &zs, &ys);
                    builder.assert_eq(out, expected, Check::Wiring);
                }
            }

            let (z, y) = (F::from_u32(z), F::from_u32(y));
            let expected = MultilinearPoint::expand_from_univariate(z, 3)
                .eq_poly_outside(&MultilinearPoint::expand_from_univariate(y, 3));
            prop_assert_eq!(test_helper::<ExpandEq, 3>([z, y, expected]), None);
        }
    }
}
