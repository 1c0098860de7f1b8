use p3_field::PrimeField64;

use super::{
    domain_separator::{DomainSeparator, query_bytes},
    errors::TranscriptError,
    pow,
    sponge::{KeccakSponge, NativeKeccak},
};
use crate::{
    constant::POW_SEED_BYTES,
    crypto::{
        field::{challenge_bytes, from_be_bytes_mod_order, scalar_bytes},
        keccak::KeccakDigest,
    },
};

/// Prover state for a Fiat-Shamir protocol.
///
/// Every absorbed byte is appended to the transcript (`narg_string`); challenges are squeezed
/// from the same sponge the verifier circuit replays.
#[derive(Debug, Clone)]
pub struct ProverState {
    sponge: KeccakSponge<u8>,
    narg_string: Vec<u8>,
}

impl ProverState {
    pub fn new(domain_separator: &DomainSeparator) -> Result<Self, TranscriptError> {
        let pattern = domain_separator.compile()?;
        Ok(Self {
            sponge: KeccakSponge::new(pattern.initial_state()),
            narg_string: Vec::new(),
        })
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.sponge.absorb(bytes);
        self.narg_string.extend_from_slice(bytes);
    }

    pub fn add_digest(&mut self, digest: &KeccakDigest) {
        self.add_bytes(digest.as_bytes());
    }

    /// Absorb field elements as their canonical values, little-endian, `ceil(bits/8)` bytes each.
    pub fn add_scalars<F: PrimeField64>(&mut self, scalars: &[F]) {
        let width = scalar_bytes::<F>();
        for scalar in scalars {
            let bytes = scalar.as_canonical_u64().to_le_bytes();
            self.add_bytes(&bytes[..width]);
        }
    }

    pub fn challenge_bytes(&mut self, len: usize) -> Vec<u8> {
        self.sponge.squeeze(&mut NativeKeccak, len)
    }

    pub fn challenge_scalars<F: PrimeField64>(&mut self, count: usize) -> Vec<F> {
        let width = challenge_bytes::<F>();
        (0..count)
            .map(|_| from_be_bytes_mod_order(&self.challenge_bytes(width)))
            .collect()
    }

    pub fn challenge_scalar<F: PrimeField64>(&mut self) -> F {
        from_be_bytes_mod_order(&self.challenge_bytes(challenge_bytes::<F>()))
    }

    /// Query indexes in `[0, 2^log_leaves)`, one per `ceil(log_leaves/8)` squeezed bytes.
    pub fn challenge_indexes(&mut self, count: usize, log_leaves: usize) -> Vec<usize> {
        let width = query_bytes(log_leaves);
        if count == 0 || width == 0 {
            return vec![0; count];
        }
        let mask = (1u64 << log_leaves) - 1;
        self.challenge_bytes(count * width)
            .chunks_exact(width)
            .map(|chunk| {
                let value = chunk
                    .iter()
                    .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
                (value & mask) as usize
            })
            .collect()
    }

    /// Squeeze a seed, grind a nonce and absorb it. No-op when `bits == 0`.
    ///
    /// If no nonce exists, `u64::MAX` is absorbed and the proof fails to verify.
    pub fn challenge_pow(&mut self, bits: usize) {
        if bits == 0 {
            return;
        }
        let seed = self.challenge_bytes(POW_SEED_BYTES);
        let nonce = pow::grind(&seed, bits).unwrap_or(u64::MAX);
        self.add_bytes(&nonce.to_le_bytes());
    }

    pub fn narg_string(&self) -> &[u8] {
        &self.narg_string
    }

    pub fn into_narg_string(self) -> Vec<u8> {
        self.narg_string
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;

    type F = BabyBear;

    fn state() -> ProverState {
        let mut ds = DomainSeparator::new("test");
        ds.add_scalars::<F>(1, "x");
        ds.challenge_scalars::<F>(1, "c");
        ProverState::new(&ds).unwrap()
    }

    #[test]
    fn test_scalars_are_little_endian() {
        let mut prover = state();
        prover.add_scalars(&[F::from_u32(0x0102_0304)]);
        assert_eq!(prover.narg_string(), &[4, 3, 2, 1]);
    }

    #[test]
    fn test_challenges_depend_on_transcript() {
        let mut a = state();
        let mut b = state();
        a.add_scalars(&[F::ONE]);
        b.add_scalars(&[F::TWO]);
        assert_ne!(a.challenge_scalar::<F>(), b.challenge_scalar::<F>());
    }

    #[test]
    fn test_indexes_are_in_range() {
        let mut prover = state();
        let indexes = prover.challenge_indexes(64, 5);
        assert_eq!(indexes.len(), 64);
        assert!(indexes.iter().all(|&i| i < 32));
    }

    #[test]
    fn test_pow_appends_valid_nonce() {
        let mut prover = state();
        let mut replay = prover.clone();
        prover.challenge_pow(6);
        let nonce_bytes: [u8; 8] = prover.narg_string().try_into().unwrap();
        let seed = replay.challenge_bytes(POW_SEED_BYTES);
        assert!(pow::check_pow(&seed, u64::from_le_bytes(nonce_bytes), 6));
    }
}
