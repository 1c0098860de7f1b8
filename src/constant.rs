/// Size in bytes of a Keccak-256 digest.
pub const DIGEST_BYTES: usize = 32;

/// Size in bytes of a serialized field element.
///
/// Elements travel as four little-endian 64-bit limbs, whatever the size of the modulus.
pub const FIELD_ELEMENT_BYTES: usize = 32;

/// Number of 64-bit limbs in a serialized field element.
pub const NUM_LIMBS: usize = 4;

/// A sumcheck round polynomial is quadratic and sent as its values at `0`, `1` and `2`.
pub const SUMCHECK_EVALUATIONS: usize = 3;

/// Bytes squeezed from the transcript as a proof-of-work seed.
pub const POW_SEED_BYTES: usize = 32;

/// Bytes absorbed as a proof-of-work nonce (a little-endian `u64`).
pub const POW_NONCE_BYTES: usize = 8;

/// Largest proof-of-work difficulty a configuration may ask for.
pub const MAX_POW_BITS: usize = 64;

/// Session identifier prefixed to every transcript pattern produced by this crate.
pub const DEFAULT_SESSION: &str = "whir-recursion";
