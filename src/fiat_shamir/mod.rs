pub mod domain_separator;
pub mod errors;
pub mod pow;
pub mod prover;
pub mod replay;
pub mod sponge;
