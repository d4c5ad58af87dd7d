//! Consensus-critical type definitions with deterministic representation.
//!
//! Field order is EXPLICIT and FROZEN - changes require a codec_version bump
//! and a new golden vector set. Canonical wire encoding lives in `codec.rs`;
//! `serde` derives here only back the legacy msgpack/JSON path used by the
//! parity harness (C11), never the consensus-critical wire format.

use serde::{Deserialize, Serialize};

/// Codec version for forward/backward compatibility.
pub const CODEC_VERSION: u32 = 1;

/// Maximum block size, wire-encoded (10 MiB).
pub const MAX_BLOCK_SIZE: usize = 10 * 1024 * 1024;

/// Maximum transaction count per block.
pub const MAX_TX_PER_BLOCK: usize = 10_000;

/// Maximum proof element count (tier 5 max).
pub const MAX_PROOF_ELEMENTS: usize = 32;

/// Hard cap on any length-prefixed field in the canonical codec (§4.1).
pub const FRAME_CAP_BYTES: usize = 16 * 1024 * 1024;

/// 32-byte opaque hash; equality is byte equality, ordering is lexicographic.
pub type Hash = [u8; 32];

/// 32-byte account identifier.
pub type Address = [u8; 32];

/// Smallest native-unit denomination; 10^9 wei = 1 token.
pub type Amount = u64;

/// Reserved address receiving the treasury share of fee distribution.
pub const TREASURY_ADDRESS: Address = [0xFFu8; 32];

/// Reserved address that permanently removes wei from circulation.
pub const BURN_ADDRESS: Address = [0u8; 32];

// ==================== HARDWARE TIERS ====================

/// Hardware tiers bounding problem size and verification budget (§4.3,
/// "budget is tier-derived"). Concrete ranges are carried forward from the
/// prior implementation as the only grounded source for this mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HardwareTier {
    Mobile = 1,      // 8-12 elements, 60s, 256MB
    Desktop = 2,     // 12-16 elements, 300s, 1GB
    Workstation = 3, // 16-20 elements, 900s, 4GB
    Server = 4,      // 20-24 elements, 1800s, 16GB
    Cluster = 5,     // 24-32 elements, 3600s, 64GB
}

impl HardwareTier {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Mobile),
            2 => Some(Self::Desktop),
            3 => Some(Self::Workstation),
            4 => Some(Self::Server),
            5 => Some(Self::Cluster),
            _ => None,
        }
    }

    pub fn element_range(&self) -> (usize, usize) {
        match self {
            Self::Mobile => (8, 12),
            Self::Desktop => (12, 16),
            Self::Workstation => (16, 20),
            Self::Server => (20, 24),
            Self::Cluster => (24, 32),
        }
    }

    /// Advisory only (§4.3) - never consulted by `verify()`.
    pub fn time_limit_ms(&self) -> u64 {
        match self {
            Self::Mobile => 60_000,
            Self::Desktop => 300_000,
            Self::Workstation => 900_000,
            Self::Server => 1_800_000,
            Self::Cluster => 3_600_000,
        }
    }

    pub fn memory_limit_mb(&self) -> u64 {
        match self {
            Self::Mobile => 256,
            Self::Desktop => 1024,
            Self::Workstation => 4096,
            Self::Server => 16384,
            Self::Cluster => 65536,
        }
    }

    pub fn max_verify_ops(&self) -> u64 {
        let (_, max_elem) = self.element_range();
        2u64.pow(max_elem as u32)
    }
}

// ==================== PROBLEM TYPES ====================

/// NP-complete problem variants. Restricted to the three named in §4.3;
/// SAT and TSP remain scaffolded (§9 open question a) until golden vectors
/// are published, so `verify()` never returns a consensus verdict for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProblemType {
    SubsetSum = 1,
    Sat = 2,
    Tsp = 3,
}

impl ProblemType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::SubsetSum),
            2 => Some(Self::Sat),
            3 => Some(Self::Tsp),
            _ => None,
        }
    }

    /// Only subset-sum participates in the accept/reject consensus path.
    pub fn is_consensus_critical(&self) -> bool {
        matches!(self, Self::SubsetSum)
    }
}

// ==================== BLOCK HEADER ====================

/// Block header - consensus-critical, deterministic hash. Field order is
/// pinned (§3) and must match `codec.rs::encode_block_header` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub codec_version: u32,
    pub block_index: u32,
    /// Seconds since Unix epoch.
    pub timestamp: i64,
    #[serde(with = "serde_bytes")]
    pub parent_hash: Hash,
    /// Root of tx hashes (§4.2).
    #[serde(with = "serde_bytes")]
    pub merkle_root: Hash,
    #[serde(with = "serde_bytes")]
    pub miner_address: Address,
    /// Commitment binding (§4.4); revealed in the block body.
    #[serde(with = "serde_bytes")]
    pub commitment: Hash,
    pub difficulty_target: u32,
    pub nonce: u64,
    #[serde(with = "serde_bytes_vec")]
    pub extra_data: Vec<u8>,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            codec_version: CODEC_VERSION,
            block_index: 0,
            timestamp: 0,
            parent_hash: [0u8; 32],
            merkle_root: [0u8; 32],
            miner_address: [0u8; 32],
            commitment: [0u8; 32],
            difficulty_target: 0,
            nonce: 0,
            extra_data: Vec::new(),
        }
    }
}

// ==================== COMMITMENT ====================

/// Commitment for the commit-reveal protocol (§4.4). Binds only the problem
/// parameters, the miner salt, and the epoch salt - the miner commits
/// *before* solving, so no solution hash participates in the binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(with = "serde_bytes")]
    pub epoch_salt: Hash,
    /// SHA-256 of `canonical_encode(problem_params)`.
    #[serde(with = "serde_bytes")]
    pub problem_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub miner_salt: Hash,
}

// ==================== PROBLEM ====================

/// Computational problem instance. Subset-sum is the one fully specified
/// variant; SAT/TSP reuse the shape as a scaffold (see `problem.rs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub problem_type: ProblemType,
    pub tier: HardwareTier,
    pub elements: Vec<i64>,
    pub target: i64,
    pub timestamp: i64,
}

// ==================== SOLUTION ====================

/// Solution to a problem instance. Indices must be strictly increasing
/// (canonical form, precludes duplicate-index grinding - §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub indices: Vec<u32>,
    pub timestamp: i64,
}

// ==================== REVEAL ====================

/// Reveal phase data: unveils the problem and solution committed to by the
/// header's `commitment` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reveal {
    pub problem: Problem,
    pub solution: Solution,
    #[serde(with = "serde_bytes")]
    pub miner_salt: Hash,
    pub nonce: u64,
}

// ==================== TRANSACTION ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    Transfer = 1,
    ProblemSubmission = 2,
    BountyPayment = 3,
}

impl TxType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Transfer),
            2 => Some(Self::ProblemSubmission),
            3 => Some(Self::BountyPayment),
            _ => None,
        }
    }
}

/// Transaction - state transition. `hash` is computed from the canonical
/// bytes, never transmitted as authoritative (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "serde_bytes")]
    pub from: Address,
    #[serde(with = "serde_bytes")]
    pub to: Address,
    pub amount: u64,
    pub fee: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub tx_type: TxType,
    #[serde(with = "serde_bytes_vec")]
    pub data: Vec<u8>,
    #[serde(with = "serde_bytes64")]
    pub signature: [u8; 64],
    pub timestamp: i64,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            from: [0u8; 32],
            to: [0u8; 32],
            amount: 0,
            fee: 0,
            nonce: 0,
            gas_limit: 21_000,
            gas_price: 1,
            tx_type: TxType::Transfer,
            data: Vec::new(),
            signature: [0u8; 64],
            timestamp: 0,
        }
    }
}

// ==================== BLOCK ====================

/// Complete block (header + transactions + reveal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// `None` for PoA blocks produced without a puzzle attempt (§2 data
    /// flow: "validators under PoA" skip the puzzle); `Some` for miner
    /// blocks that carry a commit-reveal proof.
    pub reveal: Option<Reveal>,
    /// CID of an off-chain problem/solution bundle, if one was published
    /// (§6); reference-validating code rejects malformed CIDs via `cid.rs`
    /// but the core never requires one to accept a block.
    pub cid: Option<String>,
}

// ==================== ACCOUNT ====================

/// Account record. An account with `balance == 0 && nonce == 0` and no
/// history is equivalent to the absent account (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(with = "serde_bytes")]
    pub address: Address,
    pub balance: Amount,
    pub nonce: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    pub fn new(address: Address, at: i64) -> Self {
        Self {
            address,
            balance: 0,
            nonce: 0,
            created_at: at,
            updated_at: at,
        }
    }
}

// ==================== ESCROW ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EscrowState {
    Locked = 0,
    Released = 1,
    Refunded = 2,
}

/// Escrow. Invariant: once `state != Locked`, no further transition is
/// permitted (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    #[serde(with = "serde_bytes")]
    pub id: Hash,
    #[serde(with = "serde_bytes")]
    pub submitter: Address,
    pub amount: Amount,
    #[serde(with = "serde_bytes")]
    pub problem_hash: Hash,
    pub created_block: u32,
    pub expiry_block: u32,
    pub state: EscrowState,
    pub recipient: Option<Address>,
    pub settled_block: Option<u32>,
    pub settlement_tx: Option<Hash>,
}

// ==================== VALIDATOR ====================

/// Validator record for the PoA engine (§4.9). Reputation is integer-scaled,
/// `1_000_000 ≡ 1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    #[serde(with = "serde_bytes")]
    pub public_key: Address,
    pub reputation: i64,
    pub jail_until: Option<u32>,
    pub banned: bool,
    pub cumulative_severity: u64,
}

impl ValidatorRecord {
    pub const MAX_REPUTATION: i64 = 1_000_000;

    pub fn new(public_key: Address) -> Self {
        Self {
            public_key,
            reputation: Self::MAX_REPUTATION,
            jail_until: None,
            banned: false,
            cumulative_severity: 0,
        }
    }

    pub fn is_active(&self, current_index: u32) -> bool {
        !self.banned && self.jail_until.map_or(true, |until| current_index >= until)
    }
}

// ==================== VERIFICATION BUDGET ====================

/// Budget limits for proof verification (§4.3). `max_duration_ms` is
/// advisory only and MUST NOT influence the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyBudget {
    pub max_ops: u64,
    pub max_duration_ms: u64,
    pub max_memory_bytes: u64,
}

impl VerifyBudget {
    pub fn from_tier(tier: HardwareTier) -> Self {
        Self {
            max_ops: tier.max_verify_ops(),
            max_duration_ms: tier.time_limit_ms(),
            max_memory_bytes: tier.memory_limit_mb() * 1024 * 1024,
        }
    }

    pub fn permissive() -> Self {
        Self {
            max_ops: u64::MAX,
            max_duration_ms: u64::MAX,
            max_memory_bytes: u64::MAX,
        }
    }

    pub fn strict_desktop() -> Self {
        Self::from_tier(HardwareTier::Desktop)
    }
}

// ==================== MERKLE PROOF ====================

/// Merkle proof for transaction inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub tx_index: u64,
    pub path: Vec<[u8; 32]>,
    /// `false` = sibling is on the left, `true` = sibling is on the right.
    pub directions: Vec<bool>,
}

// ==================== HELPER MODULES ====================

/// Serde helper for fixed-size byte arrays (hex in human-readable formats).
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            hex::encode(bytes).serialize(serializer)
        } else {
            bytes.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            if bytes.len() != N {
                return Err(serde::de::Error::custom(format!(
                    "Expected {} bytes, got {}",
                    N,
                    bytes.len()
                )));
            }
            let mut arr = [0u8; N];
            arr.copy_from_slice(&bytes);
            Ok(arr)
        } else {
            <[u8; N]>::deserialize(deserializer)
        }
    }
}

/// Serde helper for the 64-byte signature (same hex-in-human-readable rule).
mod serde_bytes64 {
    pub use super::serde_bytes::{deserialize, serialize};
}

/// Serde helper for variable-length byte vectors. Always hex-encodes: this
/// only backs the legacy msgpack/JSON parity path (C11), not the canonical
/// wire codec, so a uniform representation beats raw-byte efficiency.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex::encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
