//! COINjecture Core - Consensus-Critical Blockchain Logic
//!
//! This crate provides institutional-grade, deterministic, verifiable
//! implementations of all consensus-critical blockchain operations.
//!
//! # Architecture
//!
//! - **types**: Canonical data structures
//! - **codec**: Deterministic binary serialization (C1)
//! - **hash**: SHA-256 hashing primitives
//! - **merkle**: Deterministic Merkle tree construction (C2)
//! - **commitment**: Commit-reveal protocol with epoch binding (C4)
//! - **problem**: NP-complete problem generation/solving (C3)
//! - **verify**: Proof verification with resource budgets (C4)
//! - **work_score**: Integer-scaled work score and difficulty (C4)
//! - **cid**: Off-chain content-identifier validation
//! - **transaction**: Signature verification and structural checks
//! - **state**: Account/escrow state machine (C6)
//! - **store**: Atomic key-value persistence (C6)
//! - **config**: Pinned consensus parameters
//! - **block**: Genesis and block-level structural validation (C5)
//! - **mempool**: Priority-ordered pending transaction pool (C7)
//! - **chain**: Fork choice and atomic reorg (C8)
//! - **poa**: Proof-of-authority leader schedule and slashing (C9)
//! - **replay_cache**: Epoch commitment replay protection (C10)
//! - **parity**: Legacy/canonical codec shadow harness (C11)
//! - **errors**: Typed error handling (no panics in consensus)
//!
//! # Quality Gates
//!
//! - Determinism: All operations produce identical results across platforms
//! - Verifiability: All proofs verifiable in O(n) or better
//! - Reproducibility: Locked dependencies, reproducible builds
//! - Security: Defense-in-depth, budget limits, strict validation
//!
//! # Usage
//!
//! ```rust
//! use coinjecture_core::*;
//!
//! // Create a block header
//! let header = types::BlockHeader::default();
//!
//! // Compute canonical hash
//! let hash = codec::compute_header_hash(&header)?;
//!
//! // Verify a subset sum proof
//! let budget = types::VerifyBudget::strict_desktop();
//! let result = verify::verify_solution(&problem, &solution, &budget);
//! # Ok::<(), errors::ConsensusError>(())
//! ```

// Module declarations
pub mod block;
pub mod chain;
pub mod cid;
pub mod codec;
pub mod commitment;
pub mod config;
pub mod errors;
pub mod hash;
pub mod mempool;
pub mod merkle;
pub mod parity;
pub mod poa;
pub mod problem;
pub mod replay_cache;
pub mod state;
pub mod store;
pub mod transaction;
pub mod types;
pub mod verify;
pub mod work_score;

// Re-exports for convenience
pub use errors::{ConsensusError, Result};
pub use types::{
    Block, BlockHeader, Commitment, HardwareTier, MerkleProof, Problem, ProblemType, Reveal,
    Solution, Transaction, TxType, VerifyBudget, CODEC_VERSION, MAX_BLOCK_SIZE,
    MAX_PROOF_ELEMENTS, MAX_TX_PER_BLOCK,
};

/// Library version (matches Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get version info as string
pub fn version_info() -> String {
    format!(
        "{} v{} (codec v{})",
        NAME, VERSION, CODEC_VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains("coinjecture-core"));
        assert!(info.contains("4.0.0"));
    }
}
