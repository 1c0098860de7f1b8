//! The complete recursive verifier.
//!
//! [`RecursiveVerifier`] validates a [`Configuration`] once and then shapes the same circuit
//! for any proof of that configuration: both WHIR openings (the witness batch and the hiding
//! batch) replayed against a shared statement, followed by the blinded statement check
//! `S_j = F_j + ρ · G_j`.
//!
//! Public inputs are the witness root bytes, the hiding root bytes and the statement values,
//! in that order.

use p3_field::{PrimeField64, TwoAdicField};
use tracing::{debug, info, instrument};

use crate::{
    circuit::{
        CircuitBuilder, ConstraintBuilder, ConstraintSystem, ConstraintViolation, ValidationError,
        Witness, WitnessGenerator,
    },
    errors::{ConfigError, RecursionError},
    fiat_shamir::{
        domain_separator::{DomainSeparator, Pattern},
        replay::{TranscriptReplay, check_transcript},
    },
    whir::{
        batch::verify_claimed_evaluations,
        committer::reader::CommitmentReader,
        hints::{
            ClaimedEvaluations, Configuration, Hints, InstanceHint, ProofObject, ZkHint, canonical,
        },
        parameters::RoundParameters,
        verifier::WhirRoundVerifier,
    },
};

/// Outcome of checking one proof against the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfiability {
    Satisfied,
    Rejected(ConstraintViolation),
}

/// Wires produced while replaying the shared statement.
#[derive(Debug, Clone)]
pub struct ReplayedStatement<W> {
    pub witness_point: Vec<W>,
    pub hiding_point: Vec<W>,
    pub claimed: ClaimedEvaluations<W>,
    pub blinding_challenge: W,
    pub statement_values: Vec<W>,
    pub witness_batching: Vec<W>,
    pub hiding_batching: Vec<W>,
}

#[derive(Debug, Clone)]
pub struct RecursiveVerifier<F> {
    configuration: Configuration,
    witness_params: RoundParameters<F>,
    hiding_params: RoundParameters<F>,
    pattern: Pattern,
}

impl<F> RecursiveVerifier<F>
where
    F: PrimeField64 + TwoAdicField,
{
    /// Validates the configuration, compiles its pattern and checks the transcript length.
    #[instrument(skip_all, fields(transcript_len = configuration.transcript_len))]
    pub fn new(configuration: Configuration) -> Result<Self, RecursionError> {
        let witness_params = RoundParameters::new(&configuration.witness)?;
        let hiding_params = RoundParameters::new(&configuration.hiding)?;

        if witness_params.num_variables != configuration.log_num_variables {
            return Err(ConfigError::ProblemSize {
                what: "witness variables",
                expected: configuration.log_num_variables,
                actual: witness_params.num_variables,
            }
            .into());
        }
        if hiding_params.num_variables != configuration.log_num_constraints {
            return Err(ConfigError::ProblemSize {
                what: "hiding variables",
                expected: configuration.log_num_constraints,
                actual: hiding_params.num_variables,
            }
            .into());
        }
        if witness_params.batch_size != hiding_params.batch_size {
            return Err(ConfigError::BatchSizeMismatch {
                witness: witness_params.batch_size,
                hiding: hiding_params.batch_size,
            }
            .into());
        }

        let pattern = DomainSeparator::from_string(configuration.io_pattern.clone()).compile()?;
        check_transcript(
            &pattern,
            &configuration.transcript,
            configuration.transcript_len,
        )?;
        debug!(
            operations = pattern.instructions().len(),
            absorbed = pattern.absorbed_bytes(),
            "pattern compiled"
        );

        Ok(Self {
            configuration,
            witness_params,
            hiding_params,
            pattern,
        })
    }

    pub const fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub const fn witness_params(&self) -> &RoundParameters<F> {
        &self.witness_params
    }

    pub const fn hiding_params(&self) -> &RoundParameters<F> {
        &self.hiding_params
    }

    pub const fn batch_size(&self) -> usize {
        self.witness_params.batch_size
    }

    /// Builds the whole verifier against `builder`.
    ///
    /// `statement_values` are only read when `builder` assigns values.
    pub fn synthesize<B>(
        &self,
        builder: &mut B,
        witness_hint: &InstanceHint<F>,
        hiding_hint: &InstanceHint<F>,
        statement_values: &[F],
    ) -> Result<ReplayedStatement<B::Wire>, RecursionError>
    where
        B: CircuitBuilder<F>,
    {
        let batch_size = self.batch_size();
        let mut replay = TranscriptReplay::initialize(
            builder,
            &self.pattern,
            &self.configuration.transcript,
            self.configuration.transcript_len,
        )?;

        let witness_commitment =
            CommitmentReader::new(&self.witness_params).parse_commitment(builder, &mut replay)?;
        let hiding_commitment =
            CommitmentReader::new(&self.hiding_params).parse_commitment(builder, &mut replay)?;

        let witness_point =
            replay.challenge_scalars(builder, self.witness_params.num_variables)?;
        let hiding_point = replay.challenge_scalars(builder, self.hiding_params.num_variables)?;
        let claimed = ClaimedEvaluations {
            f_sums: replay.next_scalars(builder, batch_size)?,
            g_sums: replay.next_scalars(builder, batch_size)?,
        };
        let blinding_challenge = replay.next_challenge(builder)?;

        let statement_values: Vec<_> = (0..batch_size)
            .map(|j| builder.public_input(|| statement_values[j]))
            .collect();

        let witness_batching = WhirRoundVerifier::new(&self.witness_params).verify(
            builder,
            &mut replay,
            &witness_commitment,
            &witness_point,
            &claimed.f_sums,
            witness_hint,
        )?;
        let hiding_batching = WhirRoundVerifier::new(&self.hiding_params).verify(
            builder,
            &mut replay,
            &hiding_commitment,
            &hiding_point,
            &claimed.g_sums,
            hiding_hint,
        )?;

        verify_claimed_evaluations(builder, &claimed, blinding_challenge, &statement_values);
        debug!(bytes_read = replay.bytes_read(), "transcript replayed");
        replay.finish()?;

        Ok(ReplayedStatement {
            witness_point,
            hiding_point,
            claimed,
            blinding_challenge,
            statement_values,
            witness_batching,
            hiding_batching,
        })
    }

    /// The constraint system of this configuration, shaped from zero-filled hints.
    #[instrument(skip_all)]
    pub fn constraint_system(&self) -> Result<ConstraintSystem<F>, RecursionError> {
        let witness_hint =
            ZkHint::placeholder(&self.witness_params).parse(&self.witness_params, "witness")?;
        let hiding_hint =
            ZkHint::placeholder(&self.hiding_params).parse(&self.hiding_params, "hiding")?;

        let mut builder = ConstraintBuilder::new();
        self.synthesize(
            &mut builder,
            &witness_hint,
            &hiding_hint,
            &vec![F::ZERO; self.batch_size()],
        )?;
        let system = builder.build();
        info!(
            constraints = system.num_constraints(),
            public = system.num_public(),
            private = system.num_private(),
            "constraint system built"
        );
        for (check, count) in system.census() {
            debug!(?check, count);
        }
        Ok(system)
    }

    /// Assigns every wire for one proof.
    #[instrument(skip_all)]
    pub fn generate_witness(
        &self,
        hints: &Hints,
        proof: &ProofObject,
    ) -> Result<Witness<F>, RecursionError> {
        let witness_hint = hints.witness.parse(&self.witness_params, "witness")?;
        let hiding_hint = hints.hiding.parse(&self.hiding_params, "hiding")?;
        let statement_values = &proof.statement_values_at_random_point;
        if statement_values.len() != self.batch_size() {
            return Err(ConfigError::HintShape {
                what: "statement values".to_string(),
                expected: self.batch_size(),
                actual: statement_values.len(),
            }
            .into());
        }
        let statement_values = statement_values
            .iter()
            .enumerate()
            .map(|(j, value)| canonical(value, || format!("statement value {j}")))
            .collect::<Result<Vec<F>, _>>()?;

        let mut builder = WitnessGenerator::new();
        self.synthesize(&mut builder, &witness_hint, &hiding_hint, &statement_values)?;
        if let Some(check) = builder.first_violation() {
            debug!(?check, "witness violates the circuit");
        }
        Ok(builder.into_witness())
    }

    /// Builds the circuit and checks the proof's assignment against it.
    #[instrument(skip_all)]
    pub fn check(
        &self,
        hints: &Hints,
        proof: &ProofObject,
    ) -> Result<Satisfiability, RecursionError> {
        let system = self.constraint_system()?;
        let witness = self.generate_witness(hints, proof)?;
        match system.validate(&witness) {
            Ok(()) => {
                info!("proof accepted");
                Ok(Satisfiability::Satisfied)
            }
            Err(ValidationError::Unsatisfied(violation)) => {
                info!(index = violation.index, check = ?violation.check, "proof rejected");
                Ok(Satisfiability::Rejected(violation))
            }
            Err(err) => Err(err.into()),
        }
    }
}
