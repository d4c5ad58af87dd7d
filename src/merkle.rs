//! Deterministic Merkle tree construction and proofs (§4.2).
//!
//! Empty input -> 32 zero bytes. Single leaf -> that leaf. Otherwise, each
//! level is padded by duplicating its final leaf when odd, pairs are hashed
//! as `SHA256(L || R)`, and the process iterates until one node remains.

use crate::errors::{ConsensusError, Result};
use crate::hash::sha256;
use crate::types::{MerkleProof, Transaction};

/// Combine two child hashes into their parent: `SHA256(left || right)`.
fn combine_hashes(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    sha256(&combined)
}

/// One level up: pairs are hashed; an odd final leaf is duplicated, not
/// merely promoted (§4.2).
fn level_up(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = level[i];
        let right = if i + 1 < level.len() { level[i + 1] } else { level[i] };
        next.push(combine_hashes(&left, &right));
        i += 2;
    }
    next
}

pub fn compute_merkle_root(tx_hashes: &[[u8; 32]]) -> [u8; 32] {
    if tx_hashes.is_empty() {
        return [0u8; 32];
    }
    if tx_hashes.len() == 1 {
        return tx_hashes[0];
    }

    let mut level: Vec<[u8; 32]> = tx_hashes.to_vec();
    while level.len() > 1 {
        level = level_up(&level);
    }
    level[0]
}

pub fn compute_merkle_root_from_txs(transactions: &[Transaction]) -> Result<[u8; 32]> {
    let hashes: Result<Vec<[u8; 32]>> = transactions
        .iter()
        .map(crate::codec::compute_transaction_hash)
        .collect();
    Ok(compute_merkle_root(&hashes?))
}

/// Sibling hash at each level for the leaf at `tx_index`, plus the direction
/// (`true` = sibling is on the right) needed to fold it back into the root.
pub fn generate_merkle_proof(tx_hashes: &[[u8; 32]], tx_index: usize) -> Result<MerkleProof> {
    if tx_hashes.is_empty() || tx_index >= tx_hashes.len() {
        return Err(ConsensusError::IndexOutOfBounds {
            index: tx_index as u32,
            max: tx_hashes.len(),
        });
    }

    let mut path = Vec::new();
    let mut directions = Vec::new();
    let mut level: Vec<[u8; 32]> = tx_hashes.to_vec();
    let mut index = tx_index;

    while level.len() > 1 {
        let sibling_index = if index % 2 == 0 {
            (index + 1).min(level.len() - 1)
        } else {
            index - 1
        };
        path.push(level[sibling_index]);
        directions.push(sibling_index > index);

        level = level_up(&level);
        index /= 2;
    }

    Ok(MerkleProof {
        tx_index: tx_index as u64,
        path,
        directions,
    })
}

/// Reconstruct the root from `tx_hash` + `proof` and compare against
/// `expected_root`, selecting left/right by the recorded direction bit at
/// each level (§4.2).
pub fn verify_merkle_proof(
    tx_hash: &[u8; 32],
    proof: &MerkleProof,
    expected_root: &[u8; 32],
) -> Result<()> {
    if proof.path.len() != proof.directions.len() {
        return Err(ConsensusError::MerkleProofInvalid);
    }

    let mut current = *tx_hash;
    for (sibling, sibling_is_right) in proof.path.iter().zip(proof.directions.iter()) {
        current = if *sibling_is_right {
            combine_hashes(&current, sibling)
        } else {
            combine_hashes(sibling, &current)
        };
    }

    if &current != expected_root {
        return Err(ConsensusError::MerkleRootMismatch {
            expected: hex::encode(expected_root),
            computed: hex::encode(current),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_hash(val: u8) -> [u8; 32] {
        let mut h = [0u8; 32];
        h[0] = val;
        h
    }

    #[test]
    fn empty_merkle_root_is_zero() {
        assert_eq!(compute_merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn single_leaf_is_the_root() {
        let hash = make_hash(1);
        assert_eq!(compute_merkle_root(&[hash]), hash);
    }

    #[test]
    fn two_hashes_combine_directly() {
        let h1 = make_hash(1);
        let h2 = make_hash(2);
        assert_eq!(compute_merkle_root(&[h1, h2]), combine_hashes(&h1, &h2));
    }

    #[test]
    fn odd_leaf_count_duplicates_final_leaf() {
        let h1 = make_hash(1);
        let h2 = make_hash(2);
        let h3 = make_hash(3);

        let root = compute_merkle_root(&[h1, h2, h3]);

        let left = combine_hashes(&h1, &h2);
        let right = combine_hashes(&h3, &h3); // duplicated, not promoted
        let expected = combine_hashes(&left, &right);

        assert_eq!(root, expected);
    }

    #[test]
    fn four_hashes_build_balanced_tree() {
        let hashes: Vec<_> = (1..=4).map(make_hash).collect();
        let root = compute_merkle_root(&hashes);

        let left = combine_hashes(&hashes[0], &hashes[1]);
        let right = combine_hashes(&hashes[2], &hashes[3]);
        assert_eq!(root, combine_hashes(&left, &right));
    }

    #[test]
    fn deterministic_across_calls() {
        let hashes: Vec<_> = (1..=5).map(make_hash).collect();
        assert_eq!(compute_merkle_root(&hashes), compute_merkle_root(&hashes));
    }

    #[test]
    fn proof_round_trips_for_every_index_balanced() {
        let hashes: Vec<_> = (1..=4).map(make_hash).collect();
        let root = compute_merkle_root(&hashes);
        for (i, h) in hashes.iter().enumerate() {
            let proof = generate_merkle_proof(&hashes, i).unwrap();
            assert!(verify_merkle_proof(h, &proof, &root).is_ok());
        }
    }

    #[test]
    fn proof_round_trips_for_every_index_odd_count() {
        let hashes: Vec<_> = (1..=5).map(make_hash).collect();
        let root = compute_merkle_root(&hashes);
        for (i, h) in hashes.iter().enumerate() {
            let proof = generate_merkle_proof(&hashes, i).unwrap();
            assert!(verify_merkle_proof(h, &proof, &root).is_ok());
        }
    }

    #[test]
    fn proof_fails_against_wrong_root() {
        let hashes = vec![make_hash(1), make_hash(2)];
        let proof = generate_merkle_proof(&hashes, 0).unwrap();
        let wrong_root = make_hash(99);
        assert!(verify_merkle_proof(&hashes[0], &proof, &wrong_root).is_err());
    }

    #[test]
    fn proof_generation_rejects_out_of_bounds_index() {
        let hashes = vec![make_hash(1), make_hash(2)];
        assert!(generate_merkle_proof(&hashes, 10).is_err());
    }

    #[test]
    fn proof_generation_rejects_empty_tree() {
        assert!(generate_merkle_proof(&[], 0).is_err());
    }
}
