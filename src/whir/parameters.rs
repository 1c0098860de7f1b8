use p3_field::{Field, PrimeCharacteristicRing, PrimeField64, TwoAdicField};
use serde::{Deserialize, Serialize};

use crate::{constant::MAX_POW_BITS, crypto::field::Fp256, errors::ConfigError};

/// Parameters of one WHIR instance, as the companion prover serializes them.
///
/// `folding_factor` has `n_rounds + 1` entries; `ood_samples`, `num_queries` and `pow_bits`
/// have `n_rounds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhirConfig {
    pub n_rounds: usize,
    /// log2 of the inverse code rate.
    pub rate: usize,
    pub n_vars: usize,
    pub folding_factor: Vec<usize>,
    pub ood_samples: Vec<usize>,
    pub num_queries: Vec<usize>,
    pub pow_bits: Vec<usize>,
    pub final_queries: usize,
    pub final_pow_bits: usize,
    pub final_folding_pow_bits: usize,
    /// Generator of the initial evaluation domain, of order `2^(n_vars + rate)`.
    #[serde(with = "crate::crypto::field::decimal")]
    pub domain_generator: Fp256,
    pub batch_size: usize,
    /// Absent from configurations that predate it; those always sample one point.
    #[serde(default = "one")]
    pub commitment_ood_samples: usize,
}

const fn one() -> usize {
    1
}

impl WhirConfig {
    /// A configuration using the field's canonical two-adic generator.
    pub fn with_default_domain<F: PrimeField64 + TwoAdicField>(
        n_vars: usize,
        rate: usize,
        folding_factor: Vec<usize>,
        num_queries: usize,
        pow_bits: usize,
        batch_size: usize,
    ) -> Self {
        let n_rounds = folding_factor.len().saturating_sub(1);
        Self {
            n_rounds,
            rate,
            n_vars,
            folding_factor,
            ood_samples: vec![1; n_rounds],
            num_queries: vec![num_queries; n_rounds],
            pow_bits: vec![pow_bits; n_rounds],
            final_queries: num_queries,
            final_pow_bits: pow_bits,
            final_folding_pow_bits: 0,
            domain_generator: Fp256::from_field(F::two_adic_generator(n_vars + rate)),
            batch_size,
            commitment_ood_samples: 1,
        }
    }
}

/// Shape of one committed polynomial and of the opening that consumes it.
///
/// Commitment `o` encodes a polynomial in `num_variables` variables over a domain of size
/// `2^(n + rate - o)`. Its leaves group `2^folding_factor` domain points, so there are
/// `2^log_leaves` leaves, the `i`-th sitting at `leaf_generator^i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentShape<F> {
    pub num_variables: usize,
    pub folding_factor: usize,
    pub log_leaves: usize,
    pub leaf_generator: F,
    /// Field elements per leaf.
    pub leaf_width: usize,
    pub ood_samples: usize,
    pub num_queries: usize,
    pub pow_bits: usize,
}

impl<F> CommitmentShape<F> {
    /// Depth of a compressed authentication path, the leaf level excluded.
    pub const fn path_depth(&self) -> usize {
        self.log_leaves - 1
    }

    pub const fn num_leaves(&self) -> usize {
        1 << self.log_leaves
    }
}

/// A validated [`WhirConfig`] with every per-commitment quantity precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundParameters<F> {
    pub num_variables: usize,
    pub num_rounds: usize,
    pub rate: usize,
    pub batch_size: usize,
    pub commitment_ood_samples: usize,
    pub domain_generator: F,
    /// One entry per commitment: the initial one, then one per round.
    pub commitments: Vec<CommitmentShape<F>>,
    /// Variables left after the last folding, also the number of final sumcheck rounds.
    pub final_sumcheck_rounds: usize,
    pub final_folding_pow_bits: usize,
}

impl<F: PrimeField64 + TwoAdicField> RoundParameters<F> {
    pub fn new(config: &WhirConfig) -> Result<Self, ConfigError> {
        let n_rounds = config.n_rounds;
        let num_commitments = n_rounds.checked_add(1).ok_or(ConfigError::ArrayLength {
            field: "folding_factor",
            expected: usize::MAX,
            actual: config.folding_factor.len(),
        })?;
        check_length("folding_factor", num_commitments, config.folding_factor.len())?;
        check_length("ood_samples", n_rounds, config.ood_samples.len())?;
        check_length("num_queries", n_rounds, config.num_queries.len())?;
        check_length("pow_bits", n_rounds, config.pow_bits.len())?;

        if let Some(round) = config.folding_factor.iter().position(|&k| k == 0) {
            return Err(ConfigError::ZeroFoldingFactor { round });
        }
        let folded = config
            .folding_factor
            .iter()
            .try_fold(0usize, |acc, &k| acc.checked_add(k))
            .unwrap_or(usize::MAX);
        if folded > config.n_vars {
            return Err(ConfigError::TooManyFoldedVariables {
                folded,
                num_variables: config.n_vars,
            });
        }
        if config.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        for &bits in config
            .pow_bits
            .iter()
            .chain([&config.final_pow_bits, &config.final_folding_pow_bits])
        {
            if bits > MAX_POW_BITS {
                return Err(ConfigError::PowBitsTooLarge {
                    bits,
                    max: MAX_POW_BITS,
                });
            }
        }

        let log_domain = config
            .n_vars
            .checked_add(config.rate)
            .filter(|&log| log <= F::TWO_ADICITY)
            .ok_or(ConfigError::DomainTooLarge {
                log_domain: config.n_vars.saturating_add(config.rate),
                two_adicity: F::TWO_ADICITY,
            })?;
        let domain_generator: F = config
            .domain_generator
            .to_canonical_field()
            .ok_or(ConfigError::InvalidDomainGenerator { log_domain })?;
        if !has_order_power_of_two(domain_generator, log_domain) {
            return Err(ConfigError::InvalidDomainGenerator { log_domain });
        }

        let mut commitments = Vec::with_capacity(num_commitments);
        let mut num_variables = config.n_vars;
        for (round, &folding_factor) in config.folding_factor.iter().enumerate() {
            // log_domain - round - folding_factor, the number of leaves of this commitment
            let log_leaves = log_domain
                .checked_sub(round + folding_factor)
                .filter(|&log| log >= 1)
                .ok_or(ConfigError::CommitmentTooSmall { round })?;
            let (num_queries, pow_bits) = if round < n_rounds {
                (config.num_queries[round], config.pow_bits[round])
            } else {
                (config.final_queries, config.final_pow_bits)
            };
            let (ood_samples, leaf_width) = if round == 0 {
                (
                    config.commitment_ood_samples,
                    config.batch_size << folding_factor,
                )
            } else {
                (config.ood_samples[round - 1], 1 << folding_factor)
            };

            commitments.push(CommitmentShape {
                num_variables,
                folding_factor,
                log_leaves,
                leaf_generator: domain_generator.exp_power_of_2(round + folding_factor),
                leaf_width,
                ood_samples,
                num_queries,
                pow_bits,
            });
            num_variables -= folding_factor;
        }

        Ok(Self {
            num_variables: config.n_vars,
            num_rounds: n_rounds,
            rate: config.rate,
            batch_size: config.batch_size,
            commitment_ood_samples: config.commitment_ood_samples,
            domain_generator,
            commitments,
            final_sumcheck_rounds: num_variables,
            final_folding_pow_bits: config.final_folding_pow_bits,
        })
    }
}

impl<F> RoundParameters<F> {
    pub fn last_commitment(&self) -> &CommitmentShape<F> {
        &self.commitments[self.num_rounds]
    }

    /// Total number of sumcheck rounds, equal to the number of variables.
    pub fn num_sumcheck_rounds(&self) -> usize {
        self.commitments
            .iter()
            .map(|c| c.folding_factor)
            .sum::<usize>()
            + self.final_sumcheck_rounds
    }
}

const fn check_length(field: &'static str, expected: usize, actual: usize) -> Result<(), ConfigError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConfigError::ArrayLength {
            field,
            expected,
            actual,
        })
    }
}

/// Whether `generator` has multiplicative order exactly `2^log_order`.
fn has_order_power_of_two<F: Field>(generator: F, log_order: usize) -> bool {
    if generator.exp_power_of_2(log_order) != F::ONE {
        return false;
    }
    log_order == 0 || generator.exp_power_of_2(log_order - 1) != F::ONE
}
