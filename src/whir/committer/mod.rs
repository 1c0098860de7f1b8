use p3_field::Field;

use crate::{merkle_tree::MerkleTree, poly::evals::EvaluationsList};

pub mod reader;
pub mod writer;

/// The prover's view of a commitment.
///
/// Holds the committed polynomials, the Merkle tree and leaves they were encoded into, and
/// the out-of-domain samples sent right after the root.
#[derive(Debug, Clone)]
pub struct Witness<F: Field> {
    pub polynomials: Vec<EvaluationsList<F>>,
    pub leaves: Vec<Vec<F>>,
    pub tree: MerkleTree,
    pub ood_points: Vec<F>,
    /// `batch_size` answers per point, point-major.
    pub ood_answers: Vec<F>,
}
