//! Content-identifier validation for off-chain problem/solution bundles
//! (§6): base58btc over a SHA-256 multihash. The 32-byte digest is prefixed
//! by the multihash header `0x12 0x20` (34 bytes total), which base58-encodes
//! to an ASCII string of exactly 46 characters starting with `Qm`. Any CID
//! failing this check is rejected before a network fetch is ever attempted
//! (§8 scenario 6) - this module never touches the network itself.

use crate::errors::{ConsensusError, Result};
use crate::hash::sha256;

/// Multihash header for SHA-256 (code `0x12`, digest length `0x20`).
const MULTIHASH_SHA256_PREFIX: [u8; 2] = [0x12, 0x20];

/// Every valid CID produced by this scheme is exactly this many characters.
pub const CID_LENGTH: usize = 46;

/// Encode a 32-byte digest into its CIDv0-style base58btc multihash string.
pub fn encode_cid(digest: &[u8; 32]) -> String {
    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&MULTIHASH_SHA256_PREFIX);
    multihash.extend_from_slice(digest);
    bs58::encode(multihash).into_string()
}

/// Convenience: CID over the SHA-256 of arbitrary bytes.
pub fn cid_for_bytes(data: &[u8]) -> String {
    encode_cid(&sha256(data))
}

/// Validate a CID string's length, prefix, and base58btc/multihash shape
/// (§6, §8 scenario 6). Rejects before any off-chain fetch is attempted.
pub fn validate_cid(cid: &str) -> Result<()> {
    if cid.len() != CID_LENGTH {
        return Err(ConsensusError::CidFormatInvalid(format!(
            "expected {CID_LENGTH} characters, got {}",
            cid.len()
        )));
    }
    if !cid.starts_with("Qm") {
        return Err(ConsensusError::CidFormatInvalid(
            "CID must start with \"Qm\"".to_string(),
        ));
    }

    let decoded = bs58::decode(cid)
        .into_vec()
        .map_err(|e| ConsensusError::CidFormatInvalid(format!("invalid base58: {e}")))?;

    if decoded.len() != 34 || decoded[0..2] != MULTIHASH_SHA256_PREFIX {
        return Err(ConsensusError::CidFormatInvalid(
            "decoded multihash is not a 0x12 0x20-prefixed SHA-256 digest".to_string(),
        ));
    }

    Ok(())
}
