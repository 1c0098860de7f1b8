//! Prover-supplied data: the public configuration and the private hints.
//!
//! These are the transport types exchanged with the companion prover. They are decoded with
//! serde and checked against the validated [`RoundParameters`] before any constraint is built.

use p3_field::{PrimeField64, TwoAdicField};
use serde::{Deserialize, Serialize};

use super::parameters::{RoundParameters, WhirConfig};
use crate::{
    crypto::field::Fp256,
    errors::ConfigError,
    merkle_tree::{AuthPath, MultiPath},
};

/// Openings of one or more commitments.
///
/// Entry `i` of both vectors belongs to the same commitment: a compressed multi-path and the
/// opened leaf values, one leaf per query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub merkle_paths: Vec<MultiPath>,
    pub stir_answers: Vec<Vec<Vec<Fp256>>>,
}

/// Opening of the initial commitment.
///
/// `path` holds the raw batched leaves (`batch_size · 2^k` values, polynomial-major) and
/// `expected_stir_answers` their combination under the batching randomness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstRoundHint {
    pub path: Hint,
    pub expected_stir_answers: Vec<Vec<Fp256>>,
}

/// Every opening of one WHIR instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkHint {
    pub first_round: FirstRoundHint,
    /// Openings of commitments `1..=n_rounds`.
    pub round_hints: Hint,
}

/// Hints for the witness instance and the hiding instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hints {
    pub witness: ZkHint,
    pub hiding: ZkHint,
}

/// The public claims the circuit checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofObject {
    /// `S_j = F_j + ρ · G_j` for every polynomial `j` of the batch.
    pub statement_values_at_random_point: Vec<Fp256>,
}

/// Everything the verifier circuit is shaped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "whir_config_witness")]
    pub witness: WhirConfig,
    #[serde(rename = "whir_config_hiding_spartan")]
    pub hiding: WhirConfig,
    pub log_num_constraints: usize,
    pub log_num_variables: usize,
    /// Carried for the companion prover; the circuit does not depend on it.
    #[serde(default)]
    pub log_a_num_terms: usize,
    /// The transcript pattern, see [`crate::fiat_shamir::domain_separator::DomainSeparator`].
    pub io_pattern: String,
    /// Base64 in JSON.
    #[serde(with = "base64_bytes")]
    pub transcript: Vec<u8>,
    pub transcript_len: usize,
    /// Decimal `F_j`, informational only. The circuit reads the sums from the transcript.
    #[serde(default)]
    pub witness_statement_evaluations: Vec<String>,
    /// Decimal `G_j`, informational only.
    #[serde(default)]
    pub blinding_statement_evaluations: Vec<String>,
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}

/// The witness and blinding sums read from the transcript.
#[derive(Debug, Clone)]
pub struct ClaimedEvaluations<W> {
    pub f_sums: Vec<W>,
    pub g_sums: Vec<W>,
}

/// A checked opening with field values and decompressed paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningHint<F> {
    pub leaves: Vec<Vec<F>>,
    pub paths: Vec<AuthPath>,
}

/// The hints of one instance, checked against its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHint<F> {
    /// One entry per commitment, the initial one first.
    pub openings: Vec<OpeningHint<F>>,
    pub expected_first_answers: Vec<Vec<F>>,
}

impl ZkHint {
    /// A zero-filled hint with the shape `params` expects.
    pub fn placeholder<F>(params: &RoundParameters<F>) -> Self {
        let opening = |round: usize| {
            let shape = &params.commitments[round];
            (
                MultiPath::placeholder(shape.num_queries, shape.log_leaves),
                vec![vec![Fp256::default(); shape.leaf_width]; shape.num_queries],
            )
        };

        let (first_path, first_answers) = opening(0);
        let first = &params.commitments[0];
        let (merkle_paths, stir_answers) = (1..=params.num_rounds).map(opening).unzip();
        Self {
            first_round: FirstRoundHint {
                path: Hint {
                    merkle_paths: vec![first_path],
                    stir_answers: vec![first_answers],
                },
                expected_stir_answers: vec![
                    vec![Fp256::default(); 1 << first.folding_factor];
                    first.num_queries
                ],
            },
            round_hints: Hint {
                merkle_paths,
                stir_answers,
            },
        }
    }

    /// Check every count against `params` and decompress the Merkle paths.
    pub fn parse<F>(&self, params: &RoundParameters<F>, instance: &str) -> Result<InstanceHint<F>, ConfigError>
    where
        F: PrimeField64 + TwoAdicField,
    {
        let first_round = &self.first_round.path;
        check_count(instance, "first round merkle paths", 1, first_round.merkle_paths.len())?;
        check_count(instance, "first round stir answers", 1, first_round.stir_answers.len())?;
        check_count(
            instance,
            "round merkle paths",
            params.num_rounds,
            self.round_hints.merkle_paths.len(),
        )?;
        check_count(
            instance,
            "round stir answers",
            params.num_rounds,
            self.round_hints.stir_answers.len(),
        )?;

        let paths = first_round
            .merkle_paths
            .iter()
            .chain(&self.round_hints.merkle_paths);
        let answers = first_round
            .stir_answers
            .iter()
            .chain(&self.round_hints.stir_answers);

        let openings = params
            .commitments
            .iter()
            .zip(paths.zip(answers))
            .enumerate()
            .map(|(round, (shape, (path, answers)))| {
                let what = format!("{instance} opening {round}");
                check_count(&what, "queries", shape.num_queries, path.num_openings())?;
                check_count(&what, "answers", shape.num_queries, answers.len())?;
                let leaves = to_fields(&what, answers, shape.leaf_width)?;
                let paths = path.decompress(round, shape.log_leaves)?;
                Ok(OpeningHint { leaves, paths })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let first = &params.commitments[0];
        check_count(
            instance,
            "expected first round answers",
            first.num_queries,
            self.first_round.expected_stir_answers.len(),
        )?;
        let expected_first_answers = to_fields(
            instance,
            &self.first_round.expected_stir_answers,
            1 << first.folding_factor,
        )?;

        Ok(InstanceHint {
            openings,
            expected_first_answers,
        })
    }
}

impl Hints {
    pub fn placeholder<F>(witness: &RoundParameters<F>, hiding: &RoundParameters<F>) -> Self {
        Self {
            witness: ZkHint::placeholder(witness),
            hiding: ZkHint::placeholder(hiding),
        }
    }
}

fn check_count(instance: &str, what: &str, expected: usize, actual: usize) -> Result<(), ConfigError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConfigError::HintShape {
            what: format!("{instance} {what}"),
            expected,
            actual,
        })
    }
}

fn to_fields<F: PrimeField64>(
    what: &str,
    rows: &[Vec<Fp256>],
    width: usize,
) -> Result<Vec<Vec<F>>, ConfigError> {
    rows.iter()
        .enumerate()
        .map(|(query, row)| {
            check_count(what, "leaf values", width, row.len())?;
            row.iter()
                .map(|value| canonical(value, || format!("{what} query {query} leaf value")))
                .collect()
        })
        .collect()
}

/// Converts a transported value, refusing encodings that are not reduced modulo `p`.
pub fn canonical<F: PrimeField64>(
    value: &Fp256,
    what: impl FnOnce() -> String,
) -> Result<F, ConfigError> {
    value
        .to_canonical_field()
        .ok_or_else(|| ConfigError::NonCanonicalFieldElement { what: what() })
}
