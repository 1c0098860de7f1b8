//! Transport encodings and the hash used across commitments and the transcript.

pub mod field;
pub mod keccak;
