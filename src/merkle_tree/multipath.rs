use serde::{Deserialize, Serialize};

use crate::{crypto::keccak::KeccakDigest, errors::ConfigError};

/// The opening of a single leaf.
///
/// `path` runs from the root down and excludes the leaf level, so it holds
/// `log2(num_leaves) - 1` digests. The sibling at the leaf level is kept apart in
/// `leaf_sibling`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPath {
    pub leaf_index: usize,
    pub leaf_sibling: KeccakDigest,
    pub path: Vec<KeccakDigest>,
}

/// Several openings of one tree, with shared path prefixes elided.
///
/// Path `i` is rebuilt as `path[i-1][..prefix[i]] ++ suffix[i]`; the first prefix is zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultiPath {
    pub leaf_sibling_hashes: Vec<KeccakDigest>,
    pub auth_paths_prefix_lengths: Vec<usize>,
    pub auth_paths_suffixes: Vec<Vec<KeccakDigest>>,
    pub leaf_indexes: Vec<usize>,
}

impl MultiPath {
    pub fn compress(openings: &[AuthPath]) -> Self {
        let mut multi = Self::default();
        let mut previous: &[KeccakDigest] = &[];
        for opening in openings {
            let prefix = previous
                .iter()
                .zip(&opening.path)
                .take_while(|(a, b)| a == b)
                .count();
            multi.leaf_sibling_hashes.push(opening.leaf_sibling);
            multi.auth_paths_prefix_lengths.push(prefix);
            multi
                .auth_paths_suffixes
                .push(opening.path[prefix..].to_vec());
            multi.leaf_indexes.push(opening.leaf_index);
            previous = &opening.path;
        }
        multi
    }

    pub fn num_openings(&self) -> usize {
        self.leaf_indexes.len()
    }

    /// Rebuild every authentication path of a tree with `2^log_leaves` leaves.
    ///
    /// `opening` names this multi-path in errors.
    pub fn decompress(
        &self,
        opening: usize,
        log_leaves: usize,
    ) -> Result<Vec<AuthPath>, ConfigError> {
        let count = self.leaf_indexes.len();
        for (what, actual) in [
            ("leaf sibling hashes", self.leaf_sibling_hashes.len()),
            ("auth path prefix lengths", self.auth_paths_prefix_lengths.len()),
            ("auth path suffixes", self.auth_paths_suffixes.len()),
        ] {
            if actual != count {
                return Err(ConfigError::HintShape {
                    what: what.to_string(),
                    expected: count,
                    actual,
                });
            }
        }
        match self.auth_paths_prefix_lengths.first() {
            Some(&prefix) if prefix != 0 => {
                return Err(ConfigError::NonZeroFirstPrefix { prefix });
            }
            _ => {}
        }

        let depth = log_leaves.saturating_sub(1);
        let leaves = 1usize << log_leaves;
        let mut openings: Vec<AuthPath> = Vec::with_capacity(count);
        for leaf in 0..count {
            let index = self.leaf_indexes[leaf];
            if index >= leaves {
                return Err(ConfigError::LeafIndexOutOfRange {
                    opening,
                    index,
                    leaves,
                });
            }
            let prefix = self.auth_paths_prefix_lengths[leaf];
            let suffix = &self.auth_paths_suffixes[leaf];
            let length = prefix.checked_add(suffix.len());
            if length != Some(depth) {
                return Err(ConfigError::PathLength {
                    leaf,
                    expected: depth,
                    actual: length.unwrap_or(usize::MAX),
                });
            }

            let mut path = openings
                .last()
                .map_or_else(Vec::new, |previous| previous.path[..prefix].to_vec());
            path.extend_from_slice(suffix);
            openings.push(AuthPath {
                leaf_index: index,
                leaf_sibling: self.leaf_sibling_hashes[leaf],
                path,
            });
        }
        Ok(openings)
    }

    /// A zero-filled multi-path of the right shape, with every opening at leaf 0.
    pub fn placeholder(num_openings: usize, log_leaves: usize) -> Self {
        let depth = log_leaves.saturating_sub(1);
        Self {
            leaf_sibling_hashes: vec![KeccakDigest::default(); num_openings],
            auth_paths_prefix_lengths: vec![0; num_openings],
            auth_paths_suffixes: vec![vec![KeccakDigest::default(); depth]; num_openings],
            leaf_indexes: vec![0; num_openings],
        }
    }
}
