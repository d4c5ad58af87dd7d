//! Transaction signature verification and structural validation (§3
//! invariant 3). Nonce/balance/fee-split semantics are state-transition
//! concerns and live in `state.rs` (§4.6); this module only answers "is
//! this transaction well-formed and authentically signed."

use crate::codec::encode_transaction_signing_bytes;
use crate::errors::{ConsensusError, Result};
use crate::types::Transaction;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Maximum `data` payload, generous enough for a PROBLEM_SUBMISSION bundle
/// reference without admitting arbitrary blob storage on-chain.
pub const MAX_TX_DATA_BYTES: usize = 1024 * 1024;

/// Verify `tx.signature` is a valid detached signature by `tx.from` over the
/// canonical bytes of every field except the signature (§3). The core does
/// not pin a signature scheme beyond "64 bytes over a 32-byte public key"
/// (§1 Non-goals); Ed25519 is the scheme in use here.
pub fn verify_signature(tx: &Transaction) -> Result<()> {
    let public_key = VerifyingKey::from_bytes(&tx.from).map_err(|_| ConsensusError::InvalidPublicKey)?;
    let signature = Signature::from_bytes(&tx.signature);
    let message = encode_transaction_signing_bytes(tx)?;

    public_key
        .verify(&message, &signature)
        .map_err(|_| ConsensusError::InvalidSignature)
}

/// Structural checks independent of account state: payload size, and that
/// `amount + fee` does not overflow before it ever reaches `state.rs`.
pub fn validate_structure(tx: &Transaction) -> Result<()> {
    if tx.data.len() > MAX_TX_DATA_BYTES {
        return Err(ConsensusError::InvalidInput(format!(
            "transaction data too large: {} > {}",
            tx.data.len(),
            MAX_TX_DATA_BYTES
        )));
    }
    tx.amount.checked_add(tx.fee).ok_or(ConsensusError::AmountOverflow)?;
    Ok(())
}

/// Full acceptance check for a transaction seen in isolation (mempool
/// admission, block-body structural pass): signature plus structural
/// validity. Does not touch account state.
pub fn verify_transaction(tx: &Transaction) -> Result<()> {
    verify_signature(tx)?;
    validate_structure(tx)
}
