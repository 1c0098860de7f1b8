//! Keccak Merkle trees: the native tree used by the reference prover, the compressed
//! multi-path format that carries openings, and the in-circuit path verifier.

pub mod multipath;
pub mod tree;
pub mod verifier;

pub use multipath::{AuthPath, MultiPath};
pub use tree::MerkleTree;
pub use verifier::{MerkleBatch, MerklePathVerifier};
