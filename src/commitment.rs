//! Commit-reveal protocol (§4.4): anti-grinding binding of problem
//! parameters before the miner solves them.
//!
//! `commitment = SHA256(canonical_encode(problem_params) ‖ miner_salt ‖
//! epoch_salt)`. The header commits to this hash; the body reveals
//! `problem_params` and `miner_salt`. Verifiers recompute `epoch_salt` from
//! the parent and reject on any mismatch - the solution itself never enters
//! the binding, since the miner commits *before* solving.

use crate::codec::compute_problem_hash;
use crate::errors::{ConsensusError, Result};
use crate::hash::{compute_epoch_salt, sha256_multi};
use crate::types::{Commitment, Problem, Reveal};
use rand::RngCore;

/// Draw a fresh 32-byte miner salt. Must be unique per header attempt (§4.4)
/// - callers are responsible for not reusing one across attempts within an
/// epoch; this function itself carries no consensus-critical state.
pub fn generate_miner_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Build the commitment a miner publishes in the header before revealing
/// `problem` in the body.
pub fn create_commitment(
    problem: &Problem,
    miner_salt: &[u8; 32],
    parent_hash: &[u8; 32],
    timestamp: i64,
) -> Result<Commitment> {
    let epoch_salt = compute_epoch_salt(parent_hash, timestamp);
    let problem_hash = compute_problem_hash(problem)?;
    Ok(Commitment {
        epoch_salt,
        problem_hash,
        miner_salt: *miner_salt,
    })
}

/// The value that goes into `header.commitment` (§3/§4.4).
pub fn compute_commitment_hash(commitment: &Commitment) -> [u8; 32] {
    sha256_multi(&[
        &commitment.problem_hash,
        &commitment.miner_salt,
        &commitment.epoch_salt,
    ])
}

/// Recompute `epoch_salt` from the parent and verify the revealed problem
/// and miner salt bind to the header's committed hash. This is the sole
/// consensus-critical commitment check; callers separately run
/// `verify::verify_solution` on the revealed solution.
pub fn verify_commitment(
    committed_hash: &[u8; 32],
    reveal: &Reveal,
    parent_hash: &[u8; 32],
    timestamp: i64,
) -> Result<()> {
    let expected_epoch_salt = compute_epoch_salt(parent_hash, timestamp);
    let problem_hash = compute_problem_hash(&reveal.problem)?;

    let commitment = Commitment {
        epoch_salt: expected_epoch_salt,
        problem_hash,
        miner_salt: reveal.miner_salt,
    };

    let recomputed = compute_commitment_hash(&commitment);
    if &recomputed != committed_hash {
        return Err(ConsensusError::CommitmentMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HardwareTier, ProblemType, Solution};

    fn make_test_problem() -> Problem {
        Problem {
            problem_type: ProblemType::SubsetSum,
            tier: HardwareTier::Desktop,
            elements: vec![1, 2, 3, 4, 5],
            target: 9,
            timestamp: 1000,
        }
    }

    #[test]
    fn commitment_hash_deterministic() {
        let problem = make_test_problem();
        let miner_salt = [42u8; 32];
        let parent_hash = [1u8; 32];
        let timestamp = 1_700_000_000;

        let c1 = create_commitment(&problem, &miner_salt, &parent_hash, timestamp).unwrap();
        let c2 = create_commitment(&problem, &miner_salt, &parent_hash, timestamp).unwrap();

        assert_eq!(compute_commitment_hash(&c1), compute_commitment_hash(&c2));
    }

    #[test]
    fn verify_commitment_round_trips() {
        let problem = make_test_problem();
        let miner_salt = [42u8; 32];
        let parent_hash = [1u8; 32];
        let timestamp = 1_700_000_000;

        let commitment = create_commitment(&problem, &miner_salt, &parent_hash, timestamp).unwrap();
        let committed_hash = compute_commitment_hash(&commitment);

        let reveal = Reveal {
            problem,
            solution: Solution {
                indices: vec![0, 2, 4],
                timestamp: 1001,
            },
            miner_salt,
            nonce: 0,
        };

        assert!(verify_commitment(&committed_hash, &reveal, &parent_hash, timestamp).is_ok());
    }

    #[test]
    fn verify_commitment_rejects_altered_problem() {
        let problem = make_test_problem();
        let miner_salt = [42u8; 32];
        let parent_hash = [1u8; 32];
        let timestamp = 1_700_000_000;

        let commitment = create_commitment(&problem, &miner_salt, &parent_hash, timestamp).unwrap();
        let committed_hash = compute_commitment_hash(&commitment);

        let mut tampered = problem;
        tampered.target = 999;

        let reveal = Reveal {
            problem: tampered,
            solution: Solution {
                indices: vec![0, 2, 4],
                timestamp: 1001,
            },
            miner_salt,
            nonce: 0,
        };

        assert!(matches!(
            verify_commitment(&committed_hash, &reveal, &parent_hash, timestamp),
            Err(ConsensusError::CommitmentMismatch)
        ));
    }

    #[test]
    fn verify_commitment_rejects_wrong_miner_salt() {
        let problem = make_test_problem();
        let miner_salt = [42u8; 32];
        let parent_hash = [1u8; 32];
        let timestamp = 1_700_000_000;

        let commitment = create_commitment(&problem, &miner_salt, &parent_hash, timestamp).unwrap();
        let committed_hash = compute_commitment_hash(&commitment);

        let reveal = Reveal {
            problem,
            solution: Solution {
                indices: vec![0, 2, 4],
                timestamp: 1001,
            },
            miner_salt: [99u8; 32],
            nonce: 0,
        };

        assert!(verify_commitment(&committed_hash, &reveal, &parent_hash, timestamp).is_err());
    }

    #[test]
    fn verify_commitment_rejects_wrong_epoch() {
        let problem = make_test_problem();
        let miner_salt = [42u8; 32];
        let parent_hash = [1u8; 32];
        let timestamp = 1_700_000_000;

        let commitment = create_commitment(&problem, &miner_salt, &parent_hash, timestamp).unwrap();
        let committed_hash = compute_commitment_hash(&commitment);

        let reveal = Reveal {
            problem,
            solution: Solution {
                indices: vec![0, 2, 4],
                timestamp: 1001,
            },
            miner_salt,
            nonce: 0,
        };

        let wrong_epoch_timestamp = timestamp + crate::hash::EPOCH_SECONDS;
        assert!(verify_commitment(&committed_hash, &reveal, &parent_hash, wrong_epoch_timestamp).is_err());
    }

    #[test]
    fn miner_salt_is_random_each_call() {
        let a = generate_miner_salt();
        let b = generate_miner_salt();
        assert_ne!(a, b);
    }
}
