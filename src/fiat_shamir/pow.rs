//! Keccak proof-of-work.
//!
//! A nonce is valid for a 32-byte seed when `keccak256(seed ‖ nonce_le)` starts with `bits`
//! zero bits, reading the digest big-endian (the most significant bit of byte 0 first).

#[cfg(feature = "parallel")]
use rayon::broadcast;

use crate::{
    constant::{DIGEST_BYTES, POW_NONCE_BYTES},
    crypto::keccak::keccak256,
};

pub fn pow_digest(seed: &[u8], nonce: u64) -> [u8; DIGEST_BYTES] {
    let mut input = Vec::with_capacity(seed.len() + POW_NONCE_BYTES);
    input.extend_from_slice(seed);
    input.extend_from_slice(&nonce.to_le_bytes());
    keccak256(&input)
}

pub fn leading_zero_bits(digest: &[u8]) -> usize {
    let mut bits = 0;
    for &byte in digest {
        bits += byte.leading_zeros() as usize;
        if byte != 0 {
            break;
        }
    }
    bits
}

pub fn check_pow(seed: &[u8], nonce: u64, bits: usize) -> bool {
    leading_zero_bits(&pow_digest(seed, nonce)) >= bits
}

/// Smallest nonce satisfying the difficulty, or `None` if no `u64` nonce does.
#[cfg(not(feature = "parallel"))]
pub fn grind(seed: &[u8], bits: usize) -> Option<u64> {
    (0..=u64::MAX).find(|&nonce| check_pow(seed, nonce, bits))
}

/// Smallest nonce satisfying the difficulty, or `None` if no `u64` nonce does.
///
/// Every thread scans its own residue class of nonces and publishes hits through a shared
/// minimum, so the result matches the sequential search.
#[cfg(feature = "parallel")]
pub fn grind(seed: &[u8], bits: usize) -> Option<u64> {
    use std::sync::atomic::{AtomicU64, Ordering};

    let global_min = AtomicU64::new(u64::MAX);
    let _ = broadcast(|ctx| {
        let nonces = (ctx.index() as u64..=u64::MAX).step_by(ctx.num_threads());
        for nonce in nonces {
            if nonce >= global_min.load(Ordering::Relaxed) {
                break;
            }
            if check_pow(seed, nonce, bits) {
                global_min.fetch_min(nonce, Ordering::SeqCst);
                break;
            }
        }
    });

    match global_min.load(Ordering::SeqCst) {
        u64::MAX => check_pow(seed, u64::MAX, bits).then_some(u64::MAX),
        nonce => Some(nonce),
    }
}
