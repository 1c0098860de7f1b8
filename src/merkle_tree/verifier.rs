use p3_field::PrimeField64;
use tracing::instrument;

use super::multipath::AuthPath;
use crate::{
    circuit::{Check, CircuitBuilder, Lane, gadgets},
    constant::{DIGEST_BYTES, FIELD_ELEMENT_BYTES},
    crypto::keccak::KeccakDigest,
};

/// Opened leaves of one commitment together with their decompressed authentication paths.
#[derive(Debug, Clone)]
pub struct MerkleBatch<W> {
    pub leaves: Vec<Vec<W>>,
    /// Leaf indexes as claimed by the hint.
    pub leaf_indexes: Vec<W>,
    pub leaf_siblings: Vec<[W; DIGEST_BYTES]>,
    pub auth_paths: Vec<Vec<[W; DIGEST_BYTES]>>,
}

impl<W: Copy> MerkleBatch<W> {
    /// Allocate the hinted leaves and paths as private wires.
    pub fn allocate<F, B>(builder: &mut B, leaves: &[Vec<F>], openings: &[AuthPath]) -> Self
    where
        F: PrimeField64,
        B: CircuitBuilder<F, Wire = W>,
    {
        let leaves = leaves
            .iter()
            .map(|leaf| {
                leaf.iter()
                    .map(|&value| builder.private_input(|| value))
                    .collect()
            })
            .collect();
        let leaf_indexes = openings
            .iter()
            .map(|opening| builder.private_input(|| F::from_usize(opening.leaf_index)))
            .collect();
        let leaf_siblings = openings
            .iter()
            .map(|opening| allocate_digest(builder, &opening.leaf_sibling))
            .collect();
        let auth_paths = openings
            .iter()
            .map(|opening| {
                opening
                    .path
                    .iter()
                    .map(|digest| allocate_digest(builder, digest))
                    .collect()
            })
            .collect();
        Self {
            leaves,
            leaf_indexes,
            leaf_siblings,
            auth_paths,
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

fn allocate_digest<F, B>(builder: &mut B, digest: &KeccakDigest) -> [B::Wire; DIGEST_BYTES]
where
    F: PrimeField64,
    B: CircuitBuilder<F>,
{
    digest.0.map(|byte| builder.private_input(|| F::from_u8(byte)))
}

/// Checks openings of a tree with `2^log_leaves` leaves against its root.
#[derive(Debug, Clone, Copy)]
pub struct MerklePathVerifier {
    log_leaves: usize,
}

impl MerklePathVerifier {
    pub const fn new(log_leaves: usize) -> Self {
        Self { log_leaves }
    }

    /// For every opened leaf, hash it up to the root along the path selected by the
    /// transcript-derived index bits (little-endian), then require the root to match and the
    /// hinted index to equal the derived one.
    ///
    /// Every path is hashed in full: shared prefixes depend on the query indexes, and the
    /// constraint system must not.
    #[instrument(skip_all, fields(log_leaves = self.log_leaves, num_openings = batch.len()), level = "debug")]
    pub fn verify<F, B>(
        &self,
        builder: &mut B,
        root: &[B::Wire; DIGEST_BYTES],
        batch: &MerkleBatch<B::Wire>,
        index_bits: &[Vec<B::Wire>],
    ) where
        F: PrimeField64,
        B: CircuitBuilder<F>,
    {
        assert_eq!(batch.len(), index_bits.len());
        let depth = self.log_leaves;

        for (leaf, bits) in index_bits.iter().enumerate() {
            assert_eq!(bits.len(), depth);
            let lanes: Vec<_> = batch.leaves[leaf]
                .iter()
                .map(|&wire| Lane::new(wire, FIELD_ELEMENT_BYTES))
                .collect();
            let mut current = builder.keccak256(&lanes);

            for (level, &bit) in bits.iter().enumerate() {
                let sibling = if level == 0 {
                    batch.leaf_siblings[leaf]
                } else {
                    batch.auth_paths[leaf][depth - 1 - level]
                };
                // bit set: the current node is the right child
                let mut node = Vec::with_capacity(2 * DIGEST_BYTES);
                for (&cur, &sib) in current.iter().zip(&sibling) {
                    node.push(gadgets::select(builder, bit, sib, cur));
                }
                for (&cur, &sib) in current.iter().zip(&sibling) {
                    node.push(gadgets::select(builder, bit, cur, sib));
                }
                let lanes: Vec<_> = node.into_iter().map(Lane::byte).collect();
                current = builder.keccak256(&lanes);
            }

            for (&computed, &expected) in current.iter().zip(root) {
                builder.assert_eq(computed, expected, Check::MerkleRoot);
            }

            let index = gadgets::pack_bits(builder, bits);
            builder.assert_eq(index, batch.leaf_indexes[leaf], Check::QueryIndex);
        }
    }
}
