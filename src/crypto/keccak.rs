use p3_field::PrimeField64;
use p3_keccak::Keccak256Hash;
use p3_symmetric::CryptographicHasher;
use serde::{Deserialize, Serialize};

use super::field::Fp256;
use crate::constant::DIGEST_BYTES;

/// A Keccak-256 output, used for Merkle nodes and transcript roots.
///
/// In JSON it is the object `{"KeccakDigest": [..32 bytes..]}`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "DigestRepr", into = "DigestRepr")]
pub struct KeccakDigest(pub [u8; DIGEST_BYTES]);

#[derive(Clone, Copy, Serialize, Deserialize)]
struct DigestRepr {
    #[serde(rename = "KeccakDigest")]
    bytes: [u8; DIGEST_BYTES],
}

impl From<DigestRepr> for KeccakDigest {
    fn from(repr: DigestRepr) -> Self {
        Self(repr.bytes)
    }
}

impl From<KeccakDigest> for DigestRepr {
    fn from(digest: KeccakDigest) -> Self {
        Self { bytes: digest.0 }
    }
}

impl KeccakDigest {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_BYTES] {
        &self.0
    }
}

impl AsRef<[u8]> for KeccakDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Keccak-256 of a byte string.
#[must_use]
pub fn keccak256(bytes: &[u8]) -> [u8; DIGEST_BYTES] {
    Keccak256Hash {}.hash_slice(bytes)
}

/// Digest of a Merkle leaf: the hash of every value's 32-byte little-endian encoding.
#[must_use]
pub fn hash_leaf<F: PrimeField64>(values: &[F]) -> KeccakDigest {
    KeccakDigest(
        Keccak256Hash {}.hash_iter(
            values
                .iter()
                .flat_map(|&v| Fp256::from_field(v).to_le_bytes()),
        ),
    )
}

/// Digest of an inner Merkle node.
#[must_use]
pub fn compress(left: &KeccakDigest, right: &KeccakDigest) -> KeccakDigest {
    KeccakDigest(Keccak256Hash {}.hash_iter(left.0.into_iter().chain(right.0)))
}
