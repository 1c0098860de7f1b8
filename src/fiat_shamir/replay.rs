//! In-circuit replay of a Fiat-Shamir transcript.
//!
//! The verifier circuit re-derives every challenge from the transcript bytes by running the
//! same [`KeccakSponge`] as the prover, with Keccak evaluated by the circuit. Every request is
//! checked against the compiled [`Pattern`]; a request the pattern does not allow is a
//! [`TranscriptError`] raised while the circuit is being shaped.

use core::{cmp::Ordering, marker::PhantomData};

use p3_field::PrimeField64;
use tracing::instrument;

use super::{
    domain_separator::{Instruction, Op, Pattern, query_bytes},
    errors::TranscriptError,
    sponge::{KeccakSponge, SpongeHasher},
};
use crate::{
    circuit::{Check, CircuitBuilder, Lane, gadgets},
    constant::{DIGEST_BYTES, POW_NONCE_BYTES, POW_SEED_BYTES},
    crypto::field::{challenge_bytes, scalar_bytes},
};

/// Keccak-256 as a circuit gate, on byte wires.
struct CircuitKeccak<'b, F, B> {
    builder: &'b mut B,
    _field: PhantomData<F>,
}

impl<'b, F, B> CircuitKeccak<'b, F, B> {
    const fn new(builder: &'b mut B) -> Self {
        Self {
            builder,
            _field: PhantomData,
        }
    }
}

impl<F, B> SpongeHasher for CircuitKeccak<'_, F, B>
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    type Byte = B::Wire;

    fn constant(&mut self, byte: u8) -> B::Wire {
        self.builder.constant(F::from_u8(byte))
    }

    fn hash(&mut self, input: &[B::Wire]) -> [B::Wire; DIGEST_BYTES] {
        let lanes: Vec<_> = input.iter().copied().map(Lane::byte).collect();
        self.builder.keccak256(&lanes)
    }
}

/// Checks the transcript against its declared length and requires it to hold exactly the
/// bytes the pattern absorbs.
pub fn check_transcript(
    pattern: &Pattern,
    transcript: &[u8],
    declared_length: usize,
) -> Result<(), TranscriptError> {
    if declared_length != transcript.len() {
        return Err(TranscriptError::MalformedTranscript {
            declared: declared_length,
            actual: transcript.len(),
        });
    }
    let required = pattern.absorbed_bytes();
    match required.cmp(&transcript.len()) {
        Ordering::Greater => Err(TranscriptError::PatternExceedsTranscript {
            required,
            supplied: transcript.len(),
        }),
        Ordering::Less => Err(TranscriptError::TrailingTranscriptBytes {
            required,
            supplied: transcript.len(),
        }),
        Ordering::Equal => Ok(()),
    }
}

/// The verifier's side of the transcript, with byte wires of type `W`.
#[derive(Debug)]
pub struct TranscriptReplay<'a, W> {
    instructions: &'a [Instruction],
    /// Next instruction and how many of its bytes are already consumed.
    cursor: usize,
    used: usize,
    transcript: &'a [u8],
    offset: usize,
    sponge: KeccakSponge<W>,
}

impl<'a, W: Copy> TranscriptReplay<'a, W> {
    pub fn initialize<F, B>(
        builder: &mut B,
        pattern: &'a Pattern,
        transcript: &'a [u8],
        declared_length: usize,
    ) -> Result<Self, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        check_transcript(pattern, transcript, declared_length)?;
        let state = pattern
            .initial_state()
            .map(|byte| builder.constant(F::from_u8(byte)));
        Ok(Self {
            instructions: pattern.instructions(),
            cursor: 0,
            used: 0,
            transcript,
            offset: 0,
            sponge: KeccakSponge::from_state(state),
        })
    }

    /// Transcript bytes absorbed so far.
    pub const fn bytes_read(&self) -> usize {
        self.offset
    }

    /// Squeeze one challenge: `(bits + 128) / 8` bytes, big-endian, reduced modulo `p`.
    pub fn next_challenge<F, B>(&mut self, builder: &mut B) -> Result<W, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let bytes = self.squeeze(builder, challenge_bytes::<F>())?;
        Ok(gadgets::from_be_bytes(builder, &bytes))
    }

    pub fn challenge_scalars<F, B>(
        &mut self,
        builder: &mut B,
        count: usize,
    ) -> Result<Vec<W>, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        (0..count).map(|_| self.next_challenge(builder)).collect()
    }

    /// Absorb `count` prover scalars, each `ceil(bits / 8)` little-endian bytes.
    pub fn next_scalars<F, B>(
        &mut self,
        builder: &mut B,
        count: usize,
    ) -> Result<Vec<W>, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let width = scalar_bytes::<F>();
        let bytes = self.absorb_private(builder, count * width)?;
        Ok(bytes
            .chunks_exact(width)
            .map(|chunk| gadgets::from_le_bytes(builder, chunk))
            .collect())
    }

    pub fn next_digest<F, B>(&mut self, builder: &mut B) -> Result<[W; DIGEST_BYTES], TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let bytes = self.absorb_private(builder, DIGEST_BYTES)?;
        Ok(to_digest(bytes))
    }

    /// Absorb a digest whose bytes are also public inputs of the circuit.
    pub fn next_public_digest<F, B>(
        &mut self,
        builder: &mut B,
    ) -> Result<[W; DIGEST_BYTES], TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let bytes = self.read(Op::Absorb(DIGEST_BYTES))?;
        let wires: Vec<_> = bytes
            .iter()
            .map(|&byte| builder.public_input(|| F::from_u8(byte)))
            .collect();
        self.sponge.absorb(&wires);
        Ok(to_digest(wires))
    }

    /// Squeeze `count` query indexes over `2^log_leaves` leaves.
    ///
    /// Each index takes `ceil(log_leaves / 8)` bytes and keeps the low `log_leaves` bits of
    /// their big-endian value. Indexes are returned as little-endian bit wires.
    #[instrument(skip_all, fields(count = count, log_leaves = log_leaves), level = "debug")]
    pub fn next_query_indexes<F, B>(
        &mut self,
        builder: &mut B,
        count: usize,
        log_leaves: usize,
    ) -> Result<Vec<Vec<W>>, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let width = query_bytes(log_leaves);
        if count == 0 || width == 0 {
            return Ok(vec![Vec::new(); count]);
        }
        let bytes = self.squeeze(builder, count * width)?;
        Ok(bytes
            .chunks_exact(width)
            .map(|chunk| {
                let bits: Vec<_> = chunk
                    .iter()
                    .rev()
                    .flat_map(|&byte| gadgets::decompose_byte(builder, byte))
                    .collect();
                bits[..log_leaves].to_vec()
            })
            .collect())
    }

    /// Proof-of-work: squeeze a seed, absorb the prover's nonce and require
    /// `keccak256(seed ‖ nonce)` to start with `bits` zero bits. No-op when `bits == 0`.
    pub fn next_proof_of_work_nonce<F, B>(
        &mut self,
        builder: &mut B,
        bits: usize,
    ) -> Result<(), TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        if bits == 0 {
            return Ok(());
        }
        let seed = self.squeeze(builder, POW_SEED_BYTES)?;
        let nonce = self.absorb_private(builder, POW_NONCE_BYTES)?;

        let lanes: Vec<_> = seed.iter().chain(&nonce).copied().map(Lane::byte).collect();
        let digest = builder.keccak256(&lanes);

        let bits = bits.min(DIGEST_BYTES * 8);
        let (zero_bytes, partial) = (bits / 8, bits % 8);
        for &byte in &digest[..zero_bytes] {
            builder.assert_zero(byte, Check::ProofOfWork);
        }
        if partial > 0 {
            let decomposed = gadgets::decompose_byte(builder, digest[zero_bytes]);
            for &bit in &decomposed[8 - partial..] {
                builder.assert_zero(bit, Check::ProofOfWork);
            }
        }
        Ok(())
    }

    pub fn ratchet<F, B>(&mut self, builder: &mut B) -> Result<(), TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        self.consume(Op::Ratchet)?;
        self.sponge.ratchet(&mut CircuitKeccak::new(builder));
        Ok(())
    }

    /// Ends the replay, requiring the whole pattern to have been consumed.
    ///
    /// The transcript is then fully read, since [`check_transcript`] sized it to the pattern.
    pub fn finish(self) -> Result<(), TranscriptError> {
        let remaining = self.instructions.len() - self.cursor;
        if remaining > 0 {
            return Err(TranscriptError::UnconsumedPattern { remaining });
        }
        debug_assert_eq!(self.offset, self.transcript.len());
        Ok(())
    }

    fn squeeze<F, B>(&mut self, builder: &mut B, len: usize) -> Result<Vec<W>, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        self.consume(Op::Squeeze(len))?;
        Ok(self.sponge.squeeze(&mut CircuitKeccak::new(builder), len))
    }

    fn absorb_private<F, B>(&mut self, builder: &mut B, len: usize) -> Result<Vec<W>, TranscriptError>
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let bytes = self.read(Op::Absorb(len))?;
        let wires: Vec<_> = bytes
            .iter()
            .map(|&byte| builder.private_input(|| F::from_u8(byte)))
            .collect();
        self.sponge.absorb(&wires);
        Ok(wires)
    }

    /// Consume an absorb from the pattern and take its bytes from the transcript.
    fn read(&mut self, request: Op) -> Result<&'a [u8], TranscriptError> {
        self.consume(request)?;
        let len = request.num_bytes();
        let transcript = self.transcript;
        let bytes = transcript
            .get(self.offset..self.offset + len)
            .ok_or(TranscriptError::PatternExceedsTranscript {
                required: self.offset + len,
                supplied: transcript.len(),
            })?;
        self.offset += len;
        Ok(bytes)
    }

    /// Advance the cursor over `request`, which may end inside an instruction or span several
    /// instructions of the same kind.
    fn consume(&mut self, request: Op) -> Result<(), TranscriptError> {
        if request == Op::Ratchet {
            return match self.instructions.get(self.cursor) {
                Some(Instruction {
                    op: Op::Ratchet, ..
                }) if self.used == 0 => {
                    self.cursor += 1;
                    Ok(())
                }
                Some(instruction) => Err(self.mismatch(instruction, request)),
                None => Err(TranscriptError::PatternExhausted {
                    requested: request.to_string(),
                }),
            };
        }

        let mut remaining = request.num_bytes();
        while remaining > 0 {
            let instruction = self.instructions.get(self.cursor).ok_or_else(|| {
                TranscriptError::PatternExhausted {
                    requested: request.to_string(),
                }
            })?;
            let size = match (instruction.op, request) {
                (Op::Absorb(n), Op::Absorb(_)) | (Op::Squeeze(n), Op::Squeeze(_)) => n,
                _ => return Err(self.mismatch(instruction, request)),
            };
            let take = (size - self.used).min(remaining);
            self.used += take;
            remaining -= take;
            if self.used == size {
                self.cursor += 1;
                self.used = 0;
            }
        }
        Ok(())
    }

    fn mismatch(&self, instruction: &Instruction, request: Op) -> TranscriptError {
        TranscriptError::PatternMismatch {
            position: self.cursor,
            expected: format!("{} ({})", instruction.op, instruction.label),
            found: request.to_string(),
        }
    }
}

fn to_digest<W: Copy>(bytes: Vec<W>) -> [W; DIGEST_BYTES] {
    core::array::from_fn(|i| bytes[i])
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::{PrimeCharacteristicRing, PrimeField64};

    use super::*;
    use crate::{
        circuit::{ConstraintBuilder, WitnessGenerator},
        fiat_shamir::{domain_separator::DomainSeparator, prover::ProverState},
    };

    type F = BabyBear;

    fn protocol() -> DomainSeparator {
        let mut ds = DomainSeparator::new("replay");
        ds.add_digest("root");
        ds.add_scalars::<F>(2, "values");
        ds.challenge_scalars::<F>(3, "alpha");
        ds.challenge_pow("pow");
        ds.add_queries(4, 10, "queries");
        ds
    }

    fn prove(ds: &DomainSeparator, pow_bits: usize) -> (Vec<F>, Vec<usize>, Vec<u8>) {
        let mut prover = ProverState::new(ds).unwrap();
        prover.add_bytes(&[7; DIGEST_BYTES]);
        prover.add_scalars(&[F::from_u32(11), F::from_u32(1 << 30)]);
        let alphas = prover.challenge_scalars::<F>(3);
        prover.challenge_pow(pow_bits);
        let indexes = prover.challenge_indexes(4, 10);
        (alphas, indexes, prover.into_narg_string())
    }

    fn replay<B: CircuitBuilder<F>>(
        builder: &mut B,
        pattern: &Pattern,
        transcript: &[u8],
        pow_bits: usize,
    ) -> Result<(Vec<B::Wire>, Vec<Vec<B::Wire>>), TranscriptError> {
        let mut replay = TranscriptReplay::initialize(builder, pattern, transcript, transcript.len())?;
        replay.next_digest(builder)?;
        replay.next_scalars(builder, 2)?;
        let alphas = replay.challenge_scalars(builder, 3)?;
        replay.next_proof_of_work_nonce(builder, pow_bits)?;
        let indexes = replay.next_query_indexes(builder, 4, 10)?;
        replay.finish()?;
        Ok((alphas, indexes))
    }

    #[test]
    fn test_replay_matches_prover() {
        let ds = protocol();
        let pattern = ds.compile().unwrap();
        let (alphas, indexes, transcript) = prove(&ds, 4);

        let mut generator = WitnessGenerator::<F>::new();
        let (replayed, bits) = replay(&mut generator, &pattern, &transcript, 4).unwrap();
        assert_eq!(generator.first_violation(), None);
        assert_eq!(replayed, alphas);

        let replayed_indexes: Vec<usize> = bits
            .iter()
            .map(|bits| {
                bits.iter()
                    .enumerate()
                    .map(|(i, bit)| (bit.as_canonical_u64() as usize) << i)
                    .sum()
            })
            .collect();
        assert_eq!(replayed_indexes, indexes);

        let mut constraints = ConstraintBuilder::<F>::new();
        replay(&mut constraints, &pattern, &transcript, 4).unwrap();
        assert!(
            constraints
                .build()
                .validate(&generator.into_witness())
                .is_ok()
        );
    }

    #[test]
    fn test_replay_is_deterministic() {
        let ds = protocol();
        let pattern = ds.compile().unwrap();
        let (_, _, transcript) = prove(&ds, 2);

        let mut first = WitnessGenerator::<F>::new();
        let mut second = WitnessGenerator::<F>::new();
        let a = replay(&mut first, &pattern, &transcript, 2).unwrap();
        let b = replay(&mut second, &pattern, &transcript, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.into_witness(), second.into_witness());
    }

    #[test]
    fn test_bad_nonce_is_rejected() {
        let ds = protocol();
        let pattern = ds.compile().unwrap();
        let (_, _, mut transcript) = prove(&ds, 12);
        // the nonce follows the digest and both scalars
        let nonce_at = DIGEST_BYTES + 2 * scalar_bytes::<F>();
        transcript[nonce_at] ^= 1;

        let mut generator = WitnessGenerator::<F>::new();
        replay(&mut generator, &pattern, &transcript, 12).unwrap();
        assert_eq!(generator.first_violation(), Some(Check::ProofOfWork));
    }

    #[test]
    fn test_requests_may_split_and_span_instructions() {
        let mut ds = DomainSeparator::new("split");
        ds.absorb(3, "a");
        ds.absorb(5, "b");
        ds.squeeze(4, "c");
        ds.squeeze(4, "d");
        let pattern = ds.compile().unwrap();

        let mut prover = ProverState::new(&ds).unwrap();
        prover.add_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let expected = prover.challenge_bytes(8);
        let transcript = prover.into_narg_string();

        let mut generator = WitnessGenerator::<F>::new();
        let mut replay =
            TranscriptReplay::initialize(&mut generator, &pattern, &transcript, 8).unwrap();
        replay.absorb_private(&mut generator, 2).unwrap();
        replay.absorb_private(&mut generator, 6).unwrap();
        let mut squeezed = replay.squeeze(&mut generator, 6).unwrap();
        squeezed.extend(replay.squeeze(&mut generator, 2).unwrap());
        replay.finish().unwrap();

        let squeezed: Vec<u8> = squeezed.iter().map(|b| b.as_canonical_u64() as u8).collect();
        assert_eq!(squeezed, expected);
    }

    #[test]
    fn test_pattern_errors() {
        let mut ds = DomainSeparator::new("errors");
        ds.add_scalars::<F>(1, "x");
        ds.challenge_scalars::<F>(1, "c");
        let pattern = ds.compile().unwrap();
        let transcript = [0u8; 4];
        let mut builder = ConstraintBuilder::<F>::new();

        let mut replay =
            TranscriptReplay::initialize(&mut builder, &pattern, &transcript, 4).unwrap();
        assert!(matches!(
            replay.next_challenge(&mut builder),
            Err(TranscriptError::PatternMismatch { position: 0, .. })
        ));

        let mut replay =
            TranscriptReplay::initialize(&mut builder, &pattern, &transcript, 4).unwrap();
        replay.next_scalars(&mut builder, 1).unwrap();
        assert_eq!(
            replay.finish(),
            Err(TranscriptError::UnconsumedPattern { remaining: 1 })
        );

        let mut replay =
            TranscriptReplay::initialize(&mut builder, &pattern, &transcript, 4).unwrap();
        replay.next_scalars(&mut builder, 1).unwrap();
        replay.next_challenge(&mut builder).unwrap();
        assert!(matches!(
            replay.next_challenge(&mut builder),
            Err(TranscriptError::PatternExhausted { .. })
        ));
        assert!(matches!(
            replay.ratchet(&mut builder),
            Err(TranscriptError::PatternExhausted { .. })
        ));
    }

    #[test]
    fn test_transcript_length_errors() {
        let mut ds = DomainSeparator::new("length");
        ds.add_scalars::<F>(2, "x");
        let pattern = ds.compile().unwrap();

        assert_eq!(
            check_transcript(&pattern, &[0; 8], 9),
            Err(TranscriptError::MalformedTranscript {
                declared: 9,
                actual: 8
            })
        );
        assert_eq!(
            check_transcript(&pattern, &[0; 4], 4),
            Err(TranscriptError::PatternExceedsTranscript {
                required: 8,
                supplied: 4
            })
        );
        assert_eq!(
            check_transcript(&pattern, &[0; 9], 9),
            Err(TranscriptError::TrailingTranscriptBytes {
                required: 8,
                supplied: 9
            })
        );
        assert!(check_transcript(&pattern, &[0; 8], 8).is_ok());
    }

    #[test]
    fn test_ratchet_replays_like_native() {
        let mut ds = DomainSeparator::new("ratchet");
        ds.absorb(2, "x");
        ds.ratchet();
        ds.squeeze(4, "y");
        let pattern = ds.compile().unwrap();

        let mut sponge = KeccakSponge::new(pattern.initial_state());
        sponge.absorb(&[9, 9]);
        sponge.ratchet(&mut crate::fiat_shamir::sponge::NativeKeccak);
        let expected = sponge.squeeze(&mut crate::fiat_shamir::sponge::NativeKeccak, 4);

        let mut generator = WitnessGenerator::<F>::new();
        let mut replay =
            TranscriptReplay::initialize(&mut generator, &pattern, &[9, 9], 2).unwrap();
        replay.absorb_private(&mut generator, 2).unwrap();
        replay.ratchet(&mut generator).unwrap();
        let squeezed = replay.squeeze(&mut generator, 4).unwrap();
        replay.finish().unwrap();
        let squeezed: Vec<u8> = squeezed.iter().map(|b| b.as_canonical_u64() as u8).collect();
        assert_eq!(squeezed, expected);
    }
}
