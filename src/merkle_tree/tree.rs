use p3_field::PrimeField64;
use p3_maybe_rayon::prelude::*;
use p3_util::log2_strict_usize;
use tracing::instrument;

use super::multipath::{AuthPath, MultiPath};
use crate::crypto::keccak::{KeccakDigest, compress, hash_leaf};

/// A binary Keccak Merkle tree over leaves of field elements.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `layers[0]` holds the leaf digests and the last layer the root.
    layers: Vec<Vec<KeccakDigest>>,
}

impl MerkleTree {
    /// Builds the tree. The number of leaves must be a power of two, at least two.
    #[instrument(skip_all, fields(num_leaves = leaves.len()))]
    pub fn new<F: PrimeField64>(leaves: &[Vec<F>]) -> Self {
        let log_leaves = log2_strict_usize(leaves.len());
        assert!(log_leaves >= 1, "a Merkle tree needs at least two leaves");

        let mut layers = Vec::with_capacity(log_leaves + 1);
        layers.push(leaves.par_iter().map(|leaf| hash_leaf(leaf)).collect::<Vec<_>>());
        for _ in 0..log_leaves {
            let next: Vec<_> = layers[layers.len() - 1]
                .par_chunks_exact(2)
                .map(|pair| compress(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    pub fn root(&self) -> KeccakDigest {
        self.layers[self.layers.len() - 1][0]
    }

    pub fn log_leaves(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn open(&self, leaf_index: usize) -> AuthPath {
        let log_leaves = self.log_leaves();
        let path = (1..log_leaves)
            .rev()
            .map(|level| self.layers[level][(leaf_index >> level) ^ 1])
            .collect();
        AuthPath {
            leaf_index,
            leaf_sibling: self.layers[0][leaf_index ^ 1],
            path,
        }
    }

    /// Openings for `indexes`, in the given order, duplicates included.
    pub fn open_multi(&self, indexes: &[usize]) -> MultiPath {
        let openings: Vec<_> = indexes.iter().map(|&index| self.open(index)).collect();
        MultiPath::compress(&openings)
    }
}
