//! Typed error definitions for consensus-critical operations.
//!
//! NO PANICS in consensus path - all errors are typed and recoverable.
//! Every variant maps to one of the four kinds in §7 (Malformed / Policy /
//! Transient / Fatal) via `kind()`, and to a stable `error_code()` for
//! observability.

use thiserror::Error;

/// Result type alias for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// §7 error classification. Drives propagation policy: Malformed/Policy
/// reject the object with no state change; Transient reverts the
/// in-progress commit and retries next tick; Fatal halts the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    Policy,
    Transient,
    Fatal,
}

/// Consensus-critical errors - NEVER panic, always return typed error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    // ==================== CODEC ERRORS ====================
    #[error("Codec error: {0}")]
    CodecError(String),

    #[error("Unknown field in strict decode: {field}")]
    UnknownField { field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field type: expected {expected}, got {actual}")]
    InvalidFieldType { expected: String, actual: String },

    #[error("Codec version mismatch: expected {expected}, got {actual}")]
    CodecVersionMismatch { expected: u32, actual: u32 },

    #[error("Non-canonical numeric encoding detected")]
    NonCanonicalEncoding,

    #[error("NaN or Inf-equivalent sentinel not allowed")]
    InvalidFloatValue,

    #[error("Length prefix {len} exceeds frame cap {cap}")]
    FrameCapExceeded { len: usize, cap: usize },

    #[error("Trailing bytes after decode: consumed {consumed} of {total}")]
    TrailingBytes { consumed: usize, total: usize },

    #[error("Cross-path codec mismatch: legacy hash {legacy} != canonical hash {canonical}")]
    CrossPathMismatch { legacy: String, canonical: String },

    // ==================== VERIFICATION ERRORS ====================
    #[error("Verification budget exceeded: max_ops={max_ops}, actual={actual_ops}")]
    BudgetOpsExceeded { max_ops: u64, actual_ops: u64 },

    #[error("Verification memory budget exceeded: max={max_bytes}, actual={actual_bytes}")]
    BudgetMemoryExceeded { max_bytes: u64, actual_bytes: u64 },

    #[error("Subset sum verification failed: solution does not match target")]
    SubsetSumInvalid,

    #[error("Invalid proof size: tier={tier}, elements={elements}, max={max}")]
    InvalidProofSize {
        tier: u8,
        elements: usize,
        max: usize,
    },

    #[error("Solution indices out of bounds: index={index}, max={max}")]
    IndexOutOfBounds { index: u32, max: usize },

    #[error("Solution indices not strictly increasing at index={index}")]
    NonIncreasingIndices { index: u32 },

    #[error("Problem/solution variant not enabled for consensus: {0:?}")]
    NotConsensusCritical(crate::types::ProblemType),

    #[error("Work score below difficulty target: score={score}, target={target}")]
    InsufficientWorkScore { score: u64, target: u32 },

    // ==================== COMMITMENT ERRORS ====================
    #[error("Commitment binding verification failed")]
    CommitmentMismatch,

    #[error("Epoch salt binding failed: commitment does not match epoch")]
    EpochBindingFailed,

    #[error("Problem hash mismatch: expected {expected}, computed {computed}")]
    ProblemHashMismatch { expected: String, computed: String },

    // ==================== EPOCH REPLAY ERRORS ====================
    #[error("Commitment replay detected: (miner, commitment) already used at block {first_seen}")]
    CommitmentReplay { first_seen: u32 },

    // ==================== CRYPTOGRAPHIC ERRORS ====================
    #[error("Hash computation failed: {0}")]
    HashError(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("HMAC computation failed: {0}")]
    HmacError(String),

    // ==================== MERKLE TREE ERRORS ====================
    #[error("Invalid Merkle proof: path/direction length mismatch")]
    MerkleProofInvalid,

    #[error("Merkle root mismatch: expected {expected}, computed {computed}")]
    MerkleRootMismatch { expected: String, computed: String },

    // ==================== TIER VALIDATION ERRORS ====================
    #[error("Invalid hardware tier: {tier}")]
    InvalidTier { tier: u8 },

    #[error("Tier constraint violation: tier {tier} requires {min_elem}..{max_elem} elements, got {actual}")]
    TierConstraintViolation {
        tier: u8,
        min_elem: usize,
        max_elem: usize,
        actual: usize,
    },

    // ==================== CID ERRORS ====================
    #[error("CID format invalid: {0}")]
    CidFormatInvalid(String),

    // ==================== STATE TRANSITION ERRORS ====================
    #[error("Balance overflow on credit")]
    BalanceOverflow,

    #[error("Insufficient balance: have {have} wei, need {need} wei")]
    InsufficientBalance { have: u64, need: u64 },

    #[error("Nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("Fee too low: required {required} wei, provided {provided} wei")]
    FeeTooLow { required: u64, provided: u64 },

    #[error("Amount overflow when computing transaction cost")]
    AmountOverflow,

    #[error("Gas cap exceeded: block used {used}, cap {cap}")]
    GasCapExceeded { used: u64, cap: u64 },

    #[error("Escrow already settled, cannot transition again")]
    EscrowAlreadySettled,

    #[error("Escrow not found")]
    UnknownEscrow,

    #[error("Escrow not yet expired")]
    EscrowNotExpired,

    #[error("Inflation detected: minted/burned accounting diverged from balances")]
    InflationDetected,

    // ==================== MEMPOOL ERRORS ====================
    #[error("Duplicate transaction already admitted: {hash}")]
    DuplicateTransaction { hash: String },

    #[error("Mempool full: {current}/{max} transactions")]
    PoolFull { current: usize, max: usize },

    #[error("Transaction expired: age {age_secs}s exceeds max {max_secs}s")]
    TransactionExpired { age_secs: i64, max_secs: i64 },

    // ==================== PoA / SLASHING ERRORS ====================
    #[error("Miner {miner} is not an active validator")]
    UnauthorizedValidator { miner: String },

    #[error("Block proposed out of turn: expected {expected}, got {actual}")]
    OutOfTurn { expected: String, actual: String },

    #[error("Validator {validator} is banned")]
    ValidatorBanned { validator: String },

    #[error("Validator {validator} is jailed until block {until}")]
    ValidatorJailed { validator: String, until: u32 },

    #[error("Invalid genesis block: {0}")]
    InvalidGenesis(String),

    // ==================== FORK CHOICE / REORG ERRORS ====================
    #[error("Parent block not found: {parent_hash}")]
    ParentNotFound { parent_hash: String },

    #[error("Common ancestor not found between competing branches")]
    CommonAncestorNotFound,

    #[error("Reorg depth {depth} exceeds checkpoint depth {checkpoint_depth}")]
    CheckpointViolation { depth: u32, checkpoint_depth: u32 },

    #[error("Reorg aborted mid-replay at block {failed_index}; old tip retained")]
    ReorgAborted { failed_index: u32 },

    // ==================== TRANSIENT / FATAL ====================
    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Snapshot allocation failed: {0}")]
    SnapshotAllocationFailed(String),

    #[error("Invariant violated on commit path: {0}")]
    InvariantViolated(String),

    #[error("Corrupted on-disk state detected: {0}")]
    CorruptedState(String),

    // ==================== GENERAL ====================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl ConsensusError {
    /// Error code for monitoring and alerting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CodecError(_) => "E1000",
            Self::UnknownField { .. } => "E1001",
            Self::MissingField { .. } => "E1002",
            Self::InvalidFieldType { .. } => "E1003",
            Self::CodecVersionMismatch { .. } => "E1004",
            Self::NonCanonicalEncoding => "E1005",
            Self::InvalidFloatValue => "E1006",
            Self::FrameCapExceeded { .. } => "E1007",
            Self::TrailingBytes { .. } => "E1008",
            Self::CrossPathMismatch { .. } => "E1009",

            Self::BudgetOpsExceeded { .. } => "E2000",
            Self::BudgetMemoryExceeded { .. } => "E2001",
            Self::SubsetSumInvalid => "E2002",
            Self::InvalidProofSize { .. } => "E2003",
            Self::IndexOutOfBounds { .. } => "E2004",
            Self::NonIncreasingIndices { .. } => "E2005",
            Self::NotConsensusCritical(_) => "E2006",
            Self::InsufficientWorkScore { .. } => "E2007",

            Self::CommitmentMismatch => "E3000",
            Self::EpochBindingFailed => "E3001",
            Self::ProblemHashMismatch { .. } => "E3002",

            Self::CommitmentReplay { .. } => "E4000",

            Self::HashError(_) => "E5000",
            Self::InvalidSignature => "E5001",
            Self::InvalidPublicKey => "E5002",
            Self::HmacError(_) => "E5003",

            Self::MerkleProofInvalid => "E6000",
            Self::MerkleRootMismatch { .. } => "E6001",

            Self::InvalidTier { .. } => "E7000",
            Self::TierConstraintViolation { .. } => "E7001",

            Self::CidFormatInvalid(_) => "E8000",

            Self::BalanceOverflow => "E9000",
            Self::InsufficientBalance { .. } => "E9001",
            Self::NonceMismatch { .. } => "E9002",
            Self::FeeTooLow { .. } => "E9003",
            Self::AmountOverflow => "E9004",
            Self::GasCapExceeded { .. } => "E9005",
            Self::EscrowAlreadySettled => "E9006",
            Self::UnknownEscrow => "E9007",
            Self::EscrowNotExpired => "E9008",
            Self::InflationDetected => "E9009",

            Self::DuplicateTransaction { .. } => "E13000",
            Self::PoolFull { .. } => "E13001",
            Self::TransactionExpired { .. } => "E13002",

            Self::UnauthorizedValidator { .. } => "E10000",
            Self::OutOfTurn { .. } => "E10001",
            Self::ValidatorBanned { .. } => "E10002",
            Self::ValidatorJailed { .. } => "E10003",
            Self::InvalidGenesis(_) => "E10004",

            Self::ParentNotFound { .. } => "E11000",
            Self::CommonAncestorNotFound => "E11001",
            Self::CheckpointViolation { .. } => "E11002",
            Self::ReorgAborted { .. } => "E11003",

            Self::StorageWriteFailed(_) => "E12000",
            Self::SnapshotAllocationFailed(_) => "E12001",
            Self::InvariantViolated(_) => "E12002",
            Self::CorruptedState(_) => "E12003",

            Self::InvalidInput(_) => "E0001",
            Self::Internal(_) => "E0002",
            Self::NotImplemented(_) => "E0003",
        }
    }

    /// §7 classification, drives propagation policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageWriteFailed(_) | Self::SnapshotAllocationFailed(_) => {
                ErrorKind::Transient
            }
            Self::InvariantViolated(_) | Self::CorruptedState(_) | Self::InflationDetected => {
                ErrorKind::Fatal
            }
            Self::BudgetOpsExceeded { .. }
            | Self::BudgetMemoryExceeded { .. }
            | Self::GasCapExceeded { .. }
            | Self::UnauthorizedValidator { .. }
            | Self::OutOfTurn { .. }
            | Self::ValidatorBanned { .. }
            | Self::ValidatorJailed { .. }
            | Self::CommitmentReplay { .. }
            | Self::CheckpointViolation { .. }
            | Self::InsufficientWorkScore { .. }
            | Self::DuplicateTransaction { .. }
            | Self::PoolFull { .. }
            | Self::TransactionExpired { .. } => ErrorKind::Policy,
            _ => ErrorKind::Malformed,
        }
    }

    /// Is this error recoverable (engine may retry without forking)?
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Should this error trigger an operator alert / halt?
    pub fn is_critical(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}
