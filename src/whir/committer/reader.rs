use core::ops::Deref;

use p3_field::{PrimeField64, TwoAdicField};

use crate::{
    circuit::CircuitBuilder,
    constant::DIGEST_BYTES,
    fiat_shamir::{errors::TranscriptError, replay::TranscriptReplay},
    whir::parameters::RoundParameters,
};

/// A commitment as the verifier circuit reads it from the transcript.
#[derive(Debug, Clone)]
pub struct ParsedCommitment<W> {
    pub root: [W; DIGEST_BYTES],
    pub ood_points: Vec<W>,
    /// One vector of `batch_size` answers per OOD point.
    pub ood_answers: Vec<Vec<W>>,
}

/// Whether a root also becomes a public input of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootVisibility {
    Public,
    Private,
}

/// Reads the root, squeezes `num_ood` points and absorbs `batch_size` answers for each.
pub fn read_commitment<F, B>(
    builder: &mut B,
    replay: &mut TranscriptReplay<'_, B::Wire>,
    visibility: RootVisibility,
    num_ood: usize,
    batch_size: usize,
) -> Result<ParsedCommitment<B::Wire>, TranscriptError>
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    let root = match visibility {
        RootVisibility::Public => replay.next_public_digest(builder)?,
        RootVisibility::Private => replay.next_digest(builder)?,
    };
    let ood_points = replay.challenge_scalars(builder, num_ood)?;
    let ood_answers = replay
        .next_scalars(builder, num_ood * batch_size)?
        .chunks_exact(batch_size)
        .map(<[_]>::to_vec)
        .collect();
    Ok(ParsedCommitment {
        root,
        ood_points,
        ood_answers,
    })
}

/// Reads the initial commitment of an instance.
#[derive(Debug)]
pub struct CommitmentReader<'a, F>(&'a RoundParameters<F>);

impl<'a, F> CommitmentReader<'a, F>
where
    F: PrimeField64 + TwoAdicField,
{
    pub const fn new(params: &'a RoundParameters<F>) -> Self {
        Self(params)
    }

    /// The initial root is public; its OOD samples carry one answer per batched polynomial.
    pub fn parse_commitment<B>(
        &self,
        builder: &mut B,
        replay: &mut TranscriptReplay<'_, B::Wire>,
    ) -> Result<ParsedCommitment<B::Wire>, TranscriptError>
    where
        B: CircuitBuilder<F>,
    {
        read_commitment(
            builder,
            replay,
            RootVisibility::Public,
            self.commitment_ood_samples,
            self.batch_size,
        )
    }
}

impl<F> Deref for CommitmentReader<'_, F> {
    type Target = RoundParameters<F>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}
