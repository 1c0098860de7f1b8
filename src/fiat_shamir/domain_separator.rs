use std::fmt::{self, Write};

use p3_field::{PrimeField64, TwoAdicField};

use super::errors::TranscriptError;
use crate::{
    constant::{DIGEST_BYTES, POW_NONCE_BYTES, POW_SEED_BYTES},
    crypto::{
        field::{challenge_bytes, scalar_bytes},
        keccak::keccak256,
    },
    whir::parameters::RoundParameters,
};

/// This is the separator between operations in the IO Pattern
/// and as such is the only forbidden character in labels.
const SEP_BYTE: &str = "\0";

/// The IO Pattern of an interactive protocol.
///
/// An IO pattern is a string that specifies the protocol in a simple,
/// non-ambiguous, human-readable format. A typical example is the following:
///
/// ```text
///     domain-separator A32generator A32public-key R A32commitment S32challenge A32response
/// ```
/// The domain-separator is a user-specified string uniquely identifying the end-user application
/// (to avoid cross-protocol attacks). The letter `A` indicates the absorption of prover bytes
/// (an `ABSORB`), while the letter `S` indicates the squeezing (a `SQUEEZE`) of challenge bytes.
/// The letter `R` indicates a ratcheting operation. After the operation type comes the number of
/// bytes in base 10, then the label of the element. The label cannot start with a digit or
/// contain the NULL byte.
///
/// Counts are always in bytes: field elements and digests are accounted for by their
/// serialized width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainSeparator {
    io: String,
}

impl DomainSeparator {
    pub const fn from_string(io: String) -> Self {
        Self { io }
    }

    /// Create a new DomainSeparator with the domain separator.
    pub fn new(session_identifier: &str) -> Self {
        assert!(
            !session_identifier.contains(SEP_BYTE),
            "Domain separator cannot contain the separator BYTE."
        );
        Self::from_string(session_identifier.to_string())
    }

    /// Absorb `count` bytes.
    pub fn absorb(&mut self, count: usize, label: &str) {
        self.push_op('A', count, label);
    }

    /// Squeeze `count` bytes.
    pub fn squeeze(&mut self, count: usize, label: &str) {
        self.push_op('S', count, label);
    }

    pub fn ratchet(&mut self) {
        self.io += SEP_BYTE;
        self.io.push('R');
    }

    fn push_op(&mut self, id: char, count: usize, label: &str) {
        assert!(count > 0, "Count must be positive.");
        if let Err(err) = check_label(label) {
            panic!("{err}");
        }

        self.io += SEP_BYTE;
        write!(self.io, "{id}{count}{label}").expect("writing to String cannot fail");
    }

    /// Return the IO Pattern as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.io.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.io
    }

    /// Parse the IO Pattern into the instruction list consumed by transcript replay.
    pub fn compile(&self) -> Result<Pattern, TranscriptError> {
        Pattern::parse(self.as_bytes())
    }

    pub fn add_digest(&mut self, label: &str) {
        self.absorb(DIGEST_BYTES, label);
    }

    /// Absorb `count` prover field elements.
    pub fn add_scalars<F: PrimeField64>(&mut self, count: usize, label: &str) {
        if count > 0 {
            self.absorb(count * scalar_bytes::<F>(), label);
        }
    }

    /// Squeeze `count` verifier field elements.
    pub fn challenge_scalars<F: PrimeField64>(&mut self, count: usize, label: &str) {
        if count > 0 {
            self.squeeze(count * challenge_bytes::<F>(), label);
        }
    }

    /// A proof-of-work round: a 32-byte seed is squeezed, then the 8-byte nonce is absorbed.
    ///
    /// The number of bits is **not** encoded in the pattern.
    pub fn challenge_pow(&mut self, label: &str) {
        self.squeeze(POW_SEED_BYTES, label);
        self.absorb(POW_NONCE_BYTES, "pow-nonce");
    }

    pub fn pow(&mut self, bits: usize) {
        if bits > 0 {
            self.challenge_pow("pow_queries");
        }
    }

    /// Out-of-domain points, each answered by `batch_size` evaluations.
    pub fn add_ood<F: PrimeField64>(&mut self, num_samples: usize, batch_size: usize) {
        if num_samples > 0 {
            self.challenge_scalars::<F>(num_samples, "ood_query");
            self.add_scalars::<F>(num_samples * batch_size, "ood_ans");
        }
    }

    /// In-domain query indexes over a domain of `2^log_leaves` leaves.
    pub fn add_queries(&mut self, num_queries: usize, log_leaves: usize, label: &str) {
        let bytes = query_bytes(log_leaves);
        if num_queries > 0 && bytes > 0 {
            self.squeeze(num_queries * bytes, label);
        }
    }

    /// Performs `rounds` rounds of sumcheck interaction with the transcript.
    ///
    /// In each round:
    /// - Absorbs 3 scalars for the sumcheck polynomial.
    /// - Squeezes 1 scalar for folding randomness.
    /// - Optionally performs a PoW challenge if `pow_bits > 0`.
    pub fn add_sumcheck<F: PrimeField64>(&mut self, rounds: usize, pow_bits: usize) {
        for _ in 0..rounds {
            self.add_scalars::<F>(3, "sumcheck_poly");
            self.challenge_scalars::<F>(1, "folding_randomness");
            self.pow(pow_bits);
        }
    }

    /// A commitment: its Merkle root followed by its out-of-domain samples.
    pub fn add_whir_commitment<F>(&mut self, params: &RoundParameters<F>)
    where
        F: PrimeField64 + TwoAdicField,
    {
        self.add_digest("merkle_digest");
        self.add_ood::<F>(params.commitment_ood_samples, params.batch_size);
    }

    /// Every interaction of one WHIR opening proof, after its commitment.
    pub fn add_whir_proof<F>(&mut self, params: &RoundParameters<F>)
    where
        F: PrimeField64 + TwoAdicField,
    {
        if params.batch_size > 1 {
            self.challenge_scalars::<F>(1, "batching_randomness");
        }
        self.challenge_scalars::<F>(1, "initial_combination_randomness");
        self.add_sumcheck::<F>(params.commitments[0].folding_factor, 0);

        for pair in params.commitments.windows(2) {
            let (opened, next) = (&pair[0], &pair[1]);
            self.add_digest("merkle_digest");
            self.add_ood::<F>(next.ood_samples, 1);
            self.pow(opened.pow_bits);
            self.add_queries(opened.num_queries, opened.log_leaves, "stir_queries");
            self.challenge_scalars::<F>(1, "combination_randomness");
            self.add_sumcheck::<F>(next.folding_factor, 0);
        }

        let last = params.last_commitment();
        self.add_scalars::<F>(1 << params.final_sumcheck_rounds, "final_coeffs");
        self.pow(last.pow_bits);
        self.add_queries(last.num_queries, last.log_leaves, "final_queries");
        self.add_sumcheck::<F>(params.final_sumcheck_rounds, params.final_folding_pow_bits);
    }

    /// The complete recursion transcript: both commitments, the shared statement and both
    /// opening proofs.
    pub fn add_recursion_protocol<F>(
        &mut self,
        witness: &RoundParameters<F>,
        hiding: &RoundParameters<F>,
    ) where
        F: PrimeField64 + TwoAdicField,
    {
        self.add_whir_commitment(witness);
        self.add_whir_commitment(hiding);
        self.challenge_scalars::<F>(witness.num_variables, "statement_point");
        self.challenge_scalars::<F>(hiding.num_variables, "statement_point");
        self.add_scalars::<F>(witness.batch_size, "witness_evaluations");
        self.add_scalars::<F>(hiding.batch_size, "blinding_evaluations");
        self.challenge_scalars::<F>(1, "blinding_challenge");
        self.add_whir_proof(witness);
        self.add_whir_proof(hiding);
    }
}

/// Bytes squeezed per query index: `ceil(log_leaves / 8)`.
pub const fn query_bytes(log_leaves: usize) -> usize {
    log_leaves.div_ceil(8)
}

fn check_label(label: &str) -> Result<(), TranscriptError> {
    let reason = if label.contains(SEP_BYTE) {
        "Label cannot contain the separator BYTE."
    } else if label.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        "Label cannot start with a digit."
    } else {
        return Ok(());
    };
    Err(TranscriptError::InvalidLabel {
        label: label.to_string(),
        reason,
    })
}

/// Sponge operations, counted in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    /// In a tag, absorb is indicated with 'A'.
    Absorb(usize),
    /// In a tag, squeeze is indicated with 'S'.
    Squeeze(usize),
    /// Indicates a ratchet operation.
    Ratchet,
}

impl Op {
    /// Create a new OP from the portion of a tag.
    fn new(position: usize, id: char, count: Option<usize>) -> Result<Self, TranscriptError> {
        match (id, count) {
            ('A', Some(c)) if c > 0 => Ok(Self::Absorb(c)),
            ('S', Some(c)) if c > 0 => Ok(Self::Squeeze(c)),
            ('A' | 'S', _) => Err(TranscriptError::MissingCount { position }),
            ('R', None | Some(0)) => Ok(Self::Ratchet),
            ('R', Some(_)) => Err(TranscriptError::UnexpectedCount { position }),
            (other, _) => Err(TranscriptError::UnsupportedToken {
                position,
                token: other.to_string(),
            }),
        }
    }

    pub const fn num_bytes(&self) -> usize {
        match self {
            Self::Absorb(n) | Self::Squeeze(n) => *n,
            Self::Ratchet => 0,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absorb(n) => write!(f, "absorb {n} bytes"),
            Self::Squeeze(n) => write!(f, "squeeze {n} bytes"),
            Self::Ratchet => f.write_str("ratchet"),
        }
    }
}

/// One parsed pattern operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub label: String,
}

/// A compiled IO pattern: the ordered operations plus the bytes that seed the sponge.
///
/// Consecutive operations of the same kind are kept apart; transcript replay may split or
/// span them freely since the sponge does not distinguish the two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    domain_separator: Vec<u8>,
    instructions: Vec<Instruction>,
}

impl Pattern {
    pub fn parse(domain_separator: &[u8]) -> Result<Self, TranscriptError> {
        let mut instructions = Vec::new();

        // skip the session identifier
        for (position, part) in domain_separator
            .split(|&b| b == SEP_BYTE.as_bytes()[0])
            .skip(1)
            .enumerate()
        {
            let Some((&id, rest)) = part.split_first() else {
                return Err(TranscriptError::UnsupportedToken {
                    position,
                    token: String::new(),
                });
            };
            let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
            let count = if digits == 0 {
                None
            } else {
                let parsed = std::str::from_utf8(&rest[..digits])
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok());
                Some(parsed.ok_or(TranscriptError::MissingCount { position })?)
            };

            let op = Op::new(position, char::from(id), count)?;
            instructions.push(Instruction {
                op,
                label: String::from_utf8_lossy(&rest[digits..]).into_owned(),
            });
        }

        Ok(Self {
            domain_separator: domain_separator.to_vec(),
            instructions,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Total number of bytes the prover contributes.
    pub fn absorbed_bytes(&self) -> usize {
        self.instructions
            .iter()
            .filter_map(|i| match i.op {
                Op::Absorb(n) => Some(n),
                _ => None,
            })
            .sum()
    }

    /// Initial sponge state, derived from the full pattern string.
    pub fn initial_state(&self) -> [u8; DIGEST_BYTES] {
        keccak256(&self.domain_separator)
    }
}
