pub mod circuit;
pub mod constant;
pub mod crypto;
pub mod errors;
pub mod fiat_shamir;
pub mod merkle_tree;
pub mod poly;
pub mod recursion;
pub mod sumcheck;
pub mod whir;
