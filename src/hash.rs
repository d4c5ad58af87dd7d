//! SHA-256 hashing utilities for consensus-critical operations.
//!
//! All hashing is deterministic and reproducible across platforms.
//! Uses sha2 crate for audited, constant-time SHA-256 implementation.

use crate::errors::{ConsensusError, Result};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute SHA-256 of multiple byte slices (concatenated).
pub fn sha256_multi(data_slices: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for slice in data_slices {
        hasher.update(slice);
    }
    hasher.finalize().into()
}

/// Hash a string (UTF-8 encoded).
pub fn sha256_str(s: &str) -> [u8; 32] {
    sha256(s.as_bytes())
}

/// Compute hash with domain separation (prefix).
pub fn sha256_domain(domain: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive address from public key. address = SHA-256(pubkey).
pub fn derive_address(pubkey: &[u8; 32]) -> [u8; 32] {
    sha256(pubkey)
}

/// Length of one epoch bucket in seconds (§4.4).
pub const EPOCH_SECONDS: i64 = 600;

/// Compute epoch salt for commit-reveal (§4.4):
/// `epoch_salt = SHA256(parent_hash ‖ LE64(floor(timestamp / EPOCH_SECONDS)))`.
///
/// Bucketing on a time window rather than block_index means every
/// commitment observed within the same window shares a salt derived from
/// the same parent, which is what makes salts non-replayable *across*
/// epochs while remaining a pure function of chain-observable state.
pub fn compute_epoch_salt(parent_hash: &[u8; 32], timestamp: i64) -> [u8; 32] {
    let bucket = timestamp.div_euclid(EPOCH_SECONDS) as u64;
    let mut hasher = Sha256::new();
    hasher.update(parent_hash);
    hasher.update(&bucket.to_le_bytes());
    hasher.finalize().into()
}

/// Verify hash matches expected value.
pub fn verify_hash(data: &[u8], expected_hash: &[u8; 32]) -> Result<()> {
    let computed = sha256(data);
    if &computed != expected_hash {
        return Err(ConsensusError::HashError(format!(
            "Hash mismatch: expected {}, got {}",
            hex::encode(expected_hash),
            hex::encode(computed)
        )));
    }
    Ok(())
}
