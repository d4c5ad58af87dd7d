//! Block & chain model (§4.5): genesis construction and structural
//! validation, independent of account state. Grounded in the teacher's
//! `network-b/node/src/genesis.rs` (fixed genesis construction) and
//! `network-b/node/src/validator.rs` (the structural-check sequence), but
//! adapted to this crate's header shape - there is no separate `coinbase`
//! transaction; the block reward is paid by `state::StateMachine::apply_block`.

use crate::codec::{compute_header_hash, encode_block};
use crate::commitment::verify_commitment;
use crate::config::ConsensusParams;
use crate::errors::{ConsensusError, Result};
use crate::merkle::compute_merkle_root_from_txs;
use crate::transaction::verify_transaction;
use crate::types::{
    Address, Block, BlockHeader, Hash, VerifyBudget, CODEC_VERSION, MAX_BLOCK_SIZE, MAX_TX_PER_BLOCK,
};
use crate::verify::verify_solution;
use crate::work_score::compute_work_score;

/// Genesis parameters (§4.5: "a fixed validator set encoded in `extra_data`
/// (versioned)"). Not itself consensus-critical past the block it produces -
/// two nodes configured with the same `GenesisConfig` must derive byte-identical
/// genesis blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisConfig {
    pub validators: Vec<Address>,
    pub timestamp: i64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            validators: vec![[1u8; 32]],
            // 2025-01-01T00:00:00Z, matching the teacher lineage's fixed
            // genesis instant.
            timestamp: 1_735_689_600,
        }
    }
}

/// `extra_data` layout for genesis: a version byte followed by a
/// `u32`-count-prefixed sequence of 32-byte validator addresses. Versioned
/// per §4.5 so a future validator-set encoding can coexist behind a
/// `codec_version` bump.
const GENESIS_EXTRA_DATA_VERSION: u8 = 1;

pub fn encode_validator_set(validators: &[Address]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 + validators.len() * 32);
    out.push(GENESIS_EXTRA_DATA_VERSION);
    out.extend_from_slice(&(validators.len() as u32).to_le_bytes());
    for addr in validators {
        out.extend_from_slice(addr);
    }
    out
}

pub fn decode_validator_set(extra_data: &[u8]) -> Result<Vec<Address>> {
    if extra_data.is_empty() {
        return Err(ConsensusError::InvalidGenesis("empty extra_data".into()));
    }
    if extra_data[0] != GENESIS_EXTRA_DATA_VERSION {
        return Err(ConsensusError::InvalidGenesis(format!(
            "unsupported genesis extra_data version {}",
            extra_data[0]
        )));
    }
    if extra_data.len() < 5 {
        return Err(ConsensusError::InvalidGenesis("truncated validator count".into()));
    }
    let count = u32::from_le_bytes(extra_data[1..5].try_into().unwrap()) as usize;
    let expected_len = 5 + count * 32;
    if extra_data.len() != expected_len {
        return Err(ConsensusError::InvalidGenesis(format!(
            "validator set length mismatch: expected {expected_len}, got {}",
            extra_data.len()
        )));
    }
    let mut validators = Vec::with_capacity(count);
    for i in 0..count {
        let start = 5 + i * 32;
        let mut addr = [0u8; 32];
        addr.copy_from_slice(&extra_data[start..start + 32]);
        validators.push(addr);
    }
    Ok(validators)
}

/// Build the fixed genesis block (§4.5): `block_index = 0`,
/// `parent_hash = 0x32`, empty transactions, no commit-reveal puzzle
/// (the genesis validator set is authoritative by fiat, not by proof), and
/// the validator set versioned into `extra_data`.
pub fn create_genesis_block(config: &GenesisConfig) -> Block {
    let header = BlockHeader {
        codec_version: CODEC_VERSION,
        block_index: 0,
        timestamp: config.timestamp,
        parent_hash: [0u8; 32],
        merkle_root: [0u8; 32],
        miner_address: config.validators.first().copied().unwrap_or([0u8; 32]),
        commitment: [0u8; 32],
        difficulty_target: 1,
        nonce: 0,
        extra_data: encode_validator_set(&config.validators),
    };

    Block {
        header,
        transactions: Vec::new(),
        reveal: None,
        cid: None,
    }
}

/// The genesis block's identity hash, derivable without constructing the
/// full block.
pub fn genesis_hash(config: &GenesisConfig) -> Result<Hash> {
    compute_header_hash(&create_genesis_block(config).header)
}

/// Structural-only genesis validity: index, parent hash, empty body, and a
/// non-empty, correctly versioned validator set (§4.5).
pub fn is_valid_genesis(block: &Block) -> Result<()> {
    if block.header.block_index != 0 {
        return Err(ConsensusError::InvalidGenesis(format!(
            "block_index must be 0, got {}",
            block.header.block_index
        )));
    }
    if block.header.parent_hash != [0u8; 32] {
        return Err(ConsensusError::InvalidGenesis("parent_hash must be zero".into()));
    }
    if !block.transactions.is_empty() {
        return Err(ConsensusError::InvalidGenesis("genesis must carry no transactions".into()));
    }
    if block.reveal.is_some() {
        return Err(ConsensusError::InvalidGenesis("genesis must carry no commit-reveal proof".into()));
    }
    let validators = decode_validator_set(&block.header.extra_data)?;
    if validators.is_empty() {
        return Err(ConsensusError::InvalidGenesis("validator set must be non-empty".into()));
    }
    Ok(())
}

/// Pure structural validation (§4.5), no account state: codec version,
/// height/parent linkage, merkle root, per-transaction signature/structure,
/// gas cap, and wire-size cap. Does not check PoA authorization or
/// commit-reveal - those are policy checks layered on top by `poa.rs`.
pub fn validate_structure(block: &Block, parent_header: &BlockHeader, params: &ConsensusParams) -> Result<()> {
    if block.header.codec_version != CODEC_VERSION {
        return Err(ConsensusError::CodecVersionMismatch {
            expected: CODEC_VERSION,
            actual: block.header.codec_version,
        });
    }
    let expected_index = parent_header.block_index.saturating_add(1);
    if block.header.block_index != expected_index {
        return Err(ConsensusError::InvalidInput(format!(
            "block_index {} does not follow parent index {} (expected {})",
            block.header.block_index, parent_header.block_index, expected_index
        )));
    }
    let parent_hash = compute_header_hash(parent_header)?;
    if block.header.parent_hash != parent_hash {
        return Err(ConsensusError::ParentNotFound {
            parent_hash: hex::encode(block.header.parent_hash),
        });
    }

    if block.transactions.len() > MAX_TX_PER_BLOCK {
        return Err(ConsensusError::InvalidInput(format!(
            "too many transactions: {} > {}",
            block.transactions.len(),
            MAX_TX_PER_BLOCK
        )));
    }

    let computed_root = compute_merkle_root_from_txs(&block.transactions)?;
    if block.header.merkle_root != computed_root {
        return Err(ConsensusError::MerkleRootMismatch {
            expected: hex::encode(block.header.merkle_root),
            computed: hex::encode(computed_root),
        });
    }

    let mut gas_used: u64 = 0;
    for tx in &block.transactions {
        verify_transaction(tx)?;
        gas_used = gas_used
            .checked_add(tx.gas_limit)
            .ok_or(ConsensusError::AmountOverflow)?;
    }
    if gas_used > params.block_gas_cap {
        return Err(ConsensusError::GasCapExceeded {
            used: gas_used,
            cap: params.block_gas_cap,
        });
    }

    let wire_size = encode_block(block)?.len();
    if wire_size > MAX_BLOCK_SIZE {
        return Err(ConsensusError::FrameCapExceeded {
            len: wire_size,
            cap: MAX_BLOCK_SIZE,
        });
    }

    Ok(())
}

/// Commit-reveal and work-score check for a block that carries a puzzle
/// attempt (§4.4, §4.5 "for PoW puzzle blocks"). Blocks produced under pure
/// PoA rotation with `reveal = None` skip this entirely (§2 data flow:
/// "validators under PoA" skip the puzzle) - callers only invoke this when
/// `block.reveal.is_some()`.
pub fn validate_puzzle(block: &Block, parent_hash: &Hash, difficulty_target: u32) -> Result<()> {
    let reveal = block
        .reveal
        .as_ref()
        .ok_or_else(|| ConsensusError::MissingField { field: "reveal".into() })?;

    verify_commitment(&block.header.commitment, reveal, parent_hash, block.header.timestamp)?;

    let budget = VerifyBudget::from_tier(reveal.problem.tier);
    if !verify_solution(&reveal.problem, &reveal.solution, &budget) {
        return Err(ConsensusError::SubsetSumInvalid);
    }

    let score = compute_work_score(&reveal.problem, &reveal.solution, &budget);
    if score < difficulty_target as u64 {
        return Err(ConsensusError::InsufficientWorkScore {
            score,
            target: difficulty_target,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;

    fn genesis_config() -> GenesisConfig {
        GenesisConfig {
            validators: vec![[1u8; 32], [2u8; 32], [3u8; 32]],
            timestamp: 1_735_689_600,
        }
    }

    #[test]
    fn genesis_is_deterministic() {
        let config = genesis_config();
        let b1 = create_genesis_block(&config);
        let b2 = create_genesis_block(&config);
        assert_eq!(b1, b2);
    }

    #[test]
    fn genesis_is_structurally_valid() {
        let block = create_genesis_block(&genesis_config());
        assert!(is_valid_genesis(&block).is_ok());
    }

    #[test]
    fn genesis_rejects_nonzero_index() {
        let mut block = create_genesis_block(&genesis_config());
        block.header.block_index = 1;
        assert!(is_valid_genesis(&block).is_err());
    }

    #[test]
    fn validator_set_round_trips_through_extra_data() {
        let validators = vec![[9u8; 32], [8u8; 32]];
        let encoded = encode_validator_set(&validators);
        let decoded = decode_validator_set(&encoded).unwrap();
        assert_eq!(validators, decoded);
    }

    #[test]
    fn validate_structure_accepts_a_well_formed_child_of_genesis() {
        let genesis = create_genesis_block(&genesis_config());
        let params = ConsensusParams::for_tests();

        let child = Block {
            header: BlockHeader {
                codec_version: CODEC_VERSION,
                block_index: 1,
                timestamp: genesis.header.timestamp + 2,
                parent_hash: compute_header_hash(&genesis.header).unwrap(),
                merkle_root: compute_merkle_root_from_txs(&[]).unwrap(),
                miner_address: [2u8; 32],
                commitment: [0u8; 32],
                difficulty_target: 1,
                nonce: 0,
                extra_data: Vec::new(),
            },
            transactions: Vec::new(),
            reveal: None,
            cid: None,
        };

        assert!(validate_structure(&child, &genesis.header, &params).is_ok());
    }

    #[test]
    fn validate_structure_rejects_wrong_index() {
        let genesis = create_genesis_block(&genesis_config());
        let params = ConsensusParams::for_tests();

        let mut child = Block {
            header: BlockHeader {
                block_index: 5,
                parent_hash: compute_header_hash(&genesis.header).unwrap(),
                ..genesis.header.clone()
            },
            transactions: Vec::new(),
            reveal: None,
            cid: None,
        };
        child.header.merkle_root = compute_merkle_root_from_txs(&[]).unwrap();

        assert!(validate_structure(&child, &genesis.header, &params).is_err());
    }

    #[test]
    fn validate_structure_rejects_merkle_mismatch() {
        let genesis = create_genesis_block(&genesis_config());
        let params = ConsensusParams::for_tests();

        let child = Block {
            header: BlockHeader {
                block_index: 1,
                parent_hash: compute_header_hash(&genesis.header).unwrap(),
                merkle_root: [0xAB; 32],
                ..genesis.header.clone()
            },
            transactions: Vec::new(),
            reveal: None,
            cid: None,
        };

        assert!(matches!(
            validate_structure(&child, &genesis.header, &params),
            Err(ConsensusError::MerkleRootMismatch { .. })
        ));
    }

    #[test]
    fn validate_structure_rejects_gas_cap_overrun() {
        let genesis = create_genesis_block(&genesis_config());
        let mut params = ConsensusParams::for_tests();
        params.block_gas_cap = 1;

        let tx = Transaction {
            gas_limit: 21_000,
            ..Transaction::default()
        };
        let child = Block {
            header: BlockHeader {
                block_index: 1,
                parent_hash: compute_header_hash(&genesis.header).unwrap(),
                merkle_root: compute_merkle_root_from_txs(std::slice::from_ref(&tx)).unwrap(),
                ..genesis.header.clone()
            },
            transactions: vec![tx],
            reveal: None,
            cid: None,
        };

        assert!(matches!(
            validate_structure(&child, &genesis.header, &params),
            Err(ConsensusError::GasCapExceeded { .. })
        ));
    }
}
