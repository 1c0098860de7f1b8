use num_bigint::BigUint;
use p3_field::{PrimeCharacteristicRing, PrimeField64};
use serde::{Deserialize, Serialize};

use crate::constant::{FIELD_ELEMENT_BYTES, NUM_LIMBS};

/// A field element as the companion prover serializes it.
///
/// The value is `Σ limbs[i] · 2^(64·i)`, i.e. limbs are little-endian. [`Fp256::to_field`]
/// reduces any value modulo `p`; hint parsing goes through [`Fp256::to_canonical_field`] and
/// refuses values that are not already reduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fp256 {
    #[serde(rename = "Limbs")]
    pub limbs: [u64; NUM_LIMBS],
}

impl Fp256 {
    #[must_use]
    pub const fn new(limbs: [u64; NUM_LIMBS]) -> Self {
        Self { limbs }
    }

    /// Store the canonical representative of `value`.
    #[must_use]
    pub fn from_field<F: PrimeField64>(value: F) -> Self {
        Self::new([value.as_canonical_u64(), 0, 0, 0])
    }

    /// Reduce the encoded integer modulo the field order.
    #[must_use]
    pub fn to_field<F: PrimeField64>(&self) -> F {
        // 2^64 mod p, as `u64::MAX + 1`.
        let radix = F::from_u64(u64::MAX) + F::ONE;
        self.limbs
            .iter()
            .rev()
            .fold(F::ZERO, |acc, &limb| acc * radix + F::from_u64(limb))
    }

    /// The field element this value encodes, if it is below the field order.
    #[must_use]
    pub fn to_canonical_field<F: PrimeField64>(&self) -> Option<F> {
        let [low, high @ ..] = self.limbs;
        (high == [0; NUM_LIMBS - 1] && low < F::ORDER_U64).then(|| F::from_u64(low))
    }

    /// The 32-byte little-endian encoding hashed into Merkle leaves.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; FIELD_ELEMENT_BYTES] {
        let mut out = [0u8; FIELD_ELEMENT_BYTES];
        for (chunk, limb) in out.chunks_exact_mut(8).zip(self.limbs) {
            chunk.copy_from_slice(&limb.to_le_bytes());
        }
        out
    }
}

impl From<&BigUint> for Fp256 {
    /// Keeps the low 256 bits.
    fn from(value: &BigUint) -> Self {
        let mut limbs = [0; NUM_LIMBS];
        for (limb, digit) in limbs.iter_mut().zip(value.iter_u64_digits()) {
            *limb = digit;
        }
        Self::new(limbs)
    }
}

impl From<Fp256> for BigUint {
    fn from(value: Fp256) -> Self {
        Self::from_bytes_le(&value.to_le_bytes())
    }
}

/// Serde adapter for an [`Fp256`] written as a decimal string, the way the companion prover
/// encodes domain generators.
pub mod decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::Fp256;

    pub fn serialize<S: Serializer>(value: &Fp256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&BigUint::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fp256, D::Error> {
        let text = String::deserialize(deserializer)?;
        let value: BigUint = text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("`{text}` is not a decimal integer")))?;
        if value.bits() > 256 {
            return Err(D::Error::custom(format!("`{text}` does not fit in 256 bits")));
        }
        Ok(Fp256::from(&value))
    }
}

/// Number of bits needed to represent the field order.
#[must_use]
pub const fn field_bits<F: PrimeField64>() -> usize {
    (u64::BITS - F::ORDER_U64.leading_zeros()) as usize
}

/// Bytes used to serialize one prover-sent scalar: `ceil(bits / 8)`.
#[must_use]
pub const fn scalar_bytes<F: PrimeField64>() -> usize {
    field_bits::<F>().div_ceil(8)
}

/// Bytes squeezed for one challenge scalar.
///
/// The extra 128 bits make the reduction modulo `p` statistically close to uniform.
#[must_use]
pub const fn challenge_bytes<F: PrimeField64>() -> usize {
    (field_bits::<F>() + 128) / 8
}

/// Interpret `bytes` as a big-endian integer and reduce it modulo `p`.
#[must_use]
pub fn from_be_bytes_mod_order<F: PrimeField64>(bytes: &[u8]) -> F {
    let radix = F::from_u16(256);
    bytes
        .iter()
        .fold(F::ZERO, |acc, &b| acc * radix + F::from_u8(b))
}

/// Interpret `bytes` as a little-endian integer and reduce it modulo `p`.
#[must_use]
pub fn from_le_bytes_mod_order<F: PrimeField64>(bytes: &[u8]) -> F {
    let radix = F::from_u16(256);
    bytes
        .iter()
        .rev()
        .fold(F::ZERO, |acc, &b| acc * radix + F::from_u8(b))
}

/// Little-endian encoding of the canonical value, truncated to `width` bytes.
///
/// Returns `None` when the value does not fit.
#[must_use]
pub fn to_le_bytes_exact<F: PrimeField64>(value: F, width: usize) -> Option<Vec<u8>> {
    let canonical = value.as_canonical_u64();
    let mut bytes = canonical.to_le_bytes().to_vec();
    if width < bytes.len() {
        if bytes[width..].iter().any(|&b| b != 0) {
            return None;
        }
        bytes.truncate(width);
    } else {
        bytes.resize(width, 0);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeField32;
    use p3_koala_bear::KoalaBear;
    use proptest::prelude::*;

    use super::*;

    type F = BabyBear;

    #[test]
    fn test_byte_widths_baby_bear() {
        assert_eq!(field_bits::<F>(), 31);
        assert_eq!(scalar_bytes::<F>(), 4);
        assert_eq!(challenge_bytes::<F>(), 19);
    }

    #[test]
    fn test_byte_widths_koala_bear() {
        assert_eq!(field_bits::<KoalaBear>(), 31);
        assert_eq!(scalar_bytes::<KoalaBear>(), 4);
    }

    #[test]
    fn test_to_field_reduces_high_limbs() {
        // 2^64 ≡ (2^64 mod p)
        let value = Fp256::new([0, 1, 0, 0]);
        let expected = F::from_u64(u64::MAX) + F::ONE;
        assert_eq!(value.to_field::<F>(), expected);
    }

    #[test]
    fn test_canonical_conversion_rejects_unreduced_values() {
        let p = F::ORDER_U64;
        assert_eq!(Fp256::new([p - 1, 0, 0, 0]).to_canonical_field::<F>(), Some(F::NEG_ONE));
        assert_eq!(Fp256::new([p, 0, 0, 0]).to_canonical_field::<F>(), None);
        assert_eq!(Fp256::new([1, 0, 0, 1]).to_canonical_field::<F>(), None);
        // the reducing conversion still accepts both
        assert_eq!(Fp256::new([p, 0, 0, 0]).to_field::<F>(), F::ZERO);
    }

    #[test]
    fn test_decimal_limbs() {
        let value = BigUint::from(1u8) << 64u32;
        assert_eq!(Fp256::from(&value), Fp256::new([0, 1, 0, 0]));
        assert_eq!(BigUint::from(Fp256::new([5, 1, 0, 0])), value + 5u32);
    }

    #[test]
    fn test_le_bytes_layout() {
        let value = Fp256::new([0x0102, 0, 0, 0xff]);
        let bytes = value.to_le_bytes();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[1], 0x01);
        assert_eq!(bytes[24], 0xff);
        assert!(bytes[2..24].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_be_and_le_reduction_agree_on_reversed_input() {
        let bytes = [7u8, 0, 3, 250, 19];
        let mut reversed = bytes;
        reversed.reverse();
        assert_eq!(
            from_be_bytes_mod_order::<F>(&bytes),
            from_le_bytes_mod_order::<F>(&reversed)
        );
    }

    #[test]
    fn test_to_le_bytes_exact_rejects_overflow() {
        assert_eq!(to_le_bytes_exact(F::from_u32(255), 1), Some(vec![255]));
        assert_eq!(to_le_bytes_exact(F::from_u32(256), 1), None);
        assert_eq!(to_le_bytes_exact(F::from_u32(1), 3), Some(vec![1, 0, 0]));
    }

    proptest! {
        #[test]
        fn prop_fp256_roundtrip(x in 0u32..F::ORDER_U32) {
            let value = F::from_u32(x);
            prop_assert_eq!(Fp256::from_field(value).to_field::<F>(), value);
            prop_assert_eq!(Fp256::from_field(value).to_canonical_field::<F>(), Some(value));
        }

        #[test]
        fn prop_le_bytes_match_integer(x in any::<u32>()) {
            prop_assert_eq!(from_le_bytes_mod_order::<F>(&x.to_le_bytes()), F::from_u32(x));
        }
    }
}
