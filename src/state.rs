//! Account/escrow state machine (§3, §4.6). In-memory accounts and escrows
//! maps with copy-on-write snapshots for speculative execution (reorg
//! replay, mempool admission checks) - the same "snapshot, apply, commit or
//! discard" shape the teacher's `network-b/node/src/validator.rs::apply_block`
//! uses, generalized here to produce a `store::WriteBatch` rather than
//! writing straight through to redb.

use crate::config::ConsensusParams;
use crate::errors::{ConsensusError, Result};
use crate::hash::sha256_multi;
use crate::store::{keys, KvStore, WriteBatch};
use crate::types::{
    Account, Address, Amount, Block, Escrow, EscrowState as EscrowStatus, Hash, Transaction, TxType,
    BURN_ADDRESS, TREASURY_ADDRESS,
};
use std::collections::HashMap;

/// In-memory projection of the chain's account/escrow state. One instance
/// tracks the state at a single block height; `snapshot`/`restore` give
/// callers (chain reorg, mempool admission) a cheap way to try a sequence of
/// blocks and roll back without touching persistent storage.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    accounts: HashMap<Address, Account>,
    escrows: HashMap<Hash, Escrow>,
}

/// Opaque copy-on-write snapshot. Cloning a `StateMachine` is O(state size)
/// today; the teacher's account/escrow tables are small enough in practice
/// that a full clone is simpler and safer than a real journal.
pub type StateSnapshot = StateMachine;

/// Per-block application result: fee distribution and reward actually paid,
/// useful for golden-vector assertions and block receipts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockApplyResult {
    pub total_fees: Amount,
    pub producer_share: Amount,
    pub burn_share: Amount,
    pub treasury_share: Amount,
    pub reward_paid: Amount,
    pub escrows_created: Vec<Hash>,
    pub escrows_settled: Vec<Hash>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state back out of a `KvStore` snapshot written by a prior
    /// `to_write_batch` (used on node startup / parity harness replay).
    pub fn load(store: &dyn KvStore, accounts: &[Address], escrow_ids: &[Hash]) -> Result<Self> {
        let mut state = Self::new();
        for addr in accounts {
            if let Some(bytes) = store.get_state(&keys::account(addr))? {
                let account: Account = rmp_serde::from_slice(&bytes)
                    .map_err(|e| ConsensusError::CodecError(e.to_string()))?;
                state.accounts.insert(*addr, account);
            }
        }
        for id in escrow_ids {
            if let Some(bytes) = store.get_state(&keys::escrow(id))? {
                let escrow: Escrow = rmp_serde::from_slice(&bytes)
                    .map_err(|e| ConsensusError::CodecError(e.to_string()))?;
                state.escrows.insert(*id, escrow);
            }
        }
        Ok(state)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: StateSnapshot) {
        *self = snapshot;
    }

    pub fn get_account(&self, addr: &Address) -> Account {
        self.accounts.get(addr).cloned().unwrap_or_else(|| Account::new(*addr, 0))
    }

    pub fn get_escrow(&self, id: &Hash) -> Option<&Escrow> {
        self.escrows.get(id)
    }

    /// Insert or overwrite an account outright - used for genesis allocation
    /// and by callers constructing a state fixture directly rather than
    /// through `load`.
    pub fn set_account(&mut self, account: Account) {
        self.accounts.insert(account.address, account);
    }

    fn account_mut(&mut self, addr: &Address, timestamp: i64) -> &mut Account {
        self.accounts
            .entry(*addr)
            .or_insert_with(|| Account::new(*addr, timestamp))
    }

    /// Apply every transaction in `block`, then pay the block reward (§4.6).
    /// All-or-nothing: on the first invalid transaction the whole call
    /// returns an error and the caller's snapshot is untouched (callers are
    /// expected to `snapshot` first and `restore` on error).
    pub fn apply_block(&mut self, block: &Block, params: &ConsensusParams) -> Result<BlockApplyResult> {
        let mut result = BlockApplyResult::default();
        let producer = block.header.miner_address;
        let timestamp = block.header.timestamp;

        for tx in &block.transactions {
            let fee = self.apply_transaction(tx, block.header.block_index, timestamp)?;
            result.total_fees = result
                .total_fees
                .checked_add(fee)
                .ok_or(ConsensusError::AmountOverflow)?;
            match tx.tx_type {
                TxType::ProblemSubmission => {
                    if let Some(id) = problem_submission_escrow_id(tx, block.header.block_index) {
                        result.escrows_created.push(id);
                    }
                }
                TxType::BountyPayment => {
                    if let Some(id) = bounty_payment_escrow_id(tx) {
                        result.escrows_settled.push(id);
                    }
                }
                TxType::Transfer => {}
            }
        }

        let (producer_share, burn_share, treasury_share) = split_fee(result.total_fees, params);
        result.producer_share = producer_share;
        result.burn_share = burn_share;
        result.treasury_share = treasury_share;
        self.credit(&producer, producer_share, timestamp)?;
        self.credit(&BURN_ADDRESS, burn_share, timestamp)?;
        self.credit(&TREASURY_ADDRESS, treasury_share, timestamp)?;

        let reward = crate::work_score::block_reward(
            block.header.block_index,
            params.initial_reward,
            params.halving_interval,
            params.min_reward,
        );
        result.reward_paid = reward;
        self.credit(&producer, reward, timestamp)?;

        Ok(result)
    }

    /// Dispatch a single transaction to its handler (§3, §4.6). Returns the
    /// fee actually collected (always `tx.fee`; kept as a return value so
    /// `apply_block` doesn't need to re-read the transaction).
    fn apply_transaction(&mut self, tx: &Transaction, block_index: u32, timestamp: i64) -> Result<Amount> {
        let sender = self.get_account(&tx.from);
        if tx.nonce != sender.nonce {
            return Err(ConsensusError::NonceMismatch {
                expected: sender.nonce,
                got: tx.nonce,
            });
        }

        let cost = tx
            .amount
            .checked_add(tx.fee)
            .ok_or(ConsensusError::AmountOverflow)?;
        if sender.balance < cost {
            return Err(ConsensusError::InsufficientBalance {
                have: sender.balance,
                need: cost,
            });
        }

        match tx.tx_type {
            TxType::Transfer => self.apply_transfer(tx, timestamp)?,
            TxType::ProblemSubmission => self.apply_problem_submission(tx, block_index, timestamp)?,
            TxType::BountyPayment => self.apply_bounty_payment(tx, block_index, timestamp)?,
        }

        Ok(tx.fee)
    }

    fn debit_sender(&mut self, tx: &Transaction, timestamp: i64) -> Result<()> {
        let cost = tx
            .amount
            .checked_add(tx.fee)
            .ok_or(ConsensusError::AmountOverflow)?;
        let sender = self.account_mut(&tx.from, timestamp);
        sender.balance = sender
            .balance
            .checked_sub(cost)
            .ok_or(ConsensusError::InsufficientBalance {
                have: sender.balance,
                need: cost,
            })?;
        sender.nonce = sender
            .nonce
            .checked_add(1)
            .ok_or(ConsensusError::InvariantViolated("account nonce overflowed".into()))?;
        sender.updated_at = timestamp;
        Ok(())
    }

    fn credit(&mut self, addr: &Address, amount: Amount, timestamp: i64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let account = self.account_mut(addr, timestamp);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(ConsensusError::BalanceOverflow)?;
        account.updated_at = timestamp;
        Ok(())
    }

    /// Plain value transfer: debit sender (amount + fee), credit recipient
    /// with `amount`. The fee itself is credited later, split, by
    /// `apply_block`.
    fn apply_transfer(&mut self, tx: &Transaction, timestamp: i64) -> Result<()> {
        self.debit_sender(tx, timestamp)?;
        self.credit(&tx.to, tx.amount, timestamp)
    }

    /// Lock `tx.amount` into a new escrow keyed by
    /// `SHA256(submitter ‖ problem_hash ‖ created_block)` (§3). `tx.data`
    /// must be exactly `problem_hash (32 bytes) ‖ expiry_offset_blocks (u32 LE)`.
    fn apply_problem_submission(&mut self, tx: &Transaction, block_index: u32, timestamp: i64) -> Result<()> {
        let (problem_hash, expiry_offset) = decode_problem_submission_data(&tx.data)?;
        let id = sha256_multi(&[&tx.from, &problem_hash, &block_index.to_le_bytes()]);
        if self.escrows.contains_key(&id) {
            return Err(ConsensusError::InvariantViolated("escrow id collision".into()));
        }

        self.debit_sender(tx, timestamp)?;

        self.escrows.insert(
            id,
            Escrow {
                id,
                submitter: tx.from,
                amount: tx.amount,
                problem_hash,
                created_block: block_index,
                expiry_block: block_index.saturating_add(expiry_offset),
                state: EscrowStatus::Locked,
                recipient: Some(tx.to),
                settled_block: None,
                settlement_tx: None,
            },
        );
        Ok(())
    }

    /// Release or refund an existing escrow. `tx.data` must be exactly
    /// `escrow_id (32 bytes) ‖ action (1 byte: 0 = release, 1 = refund)`.
    /// An escrow that has already settled can never settle again (§3
    /// invariant): this method returns `EscrowAlreadySettled` rather than
    /// silently re-paying out.
    fn apply_bounty_payment(&mut self, tx: &Transaction, block_index: u32, timestamp: i64) -> Result<()> {
        let (id, release) = decode_bounty_payment_data(&tx.data)?;
        let escrow = self
            .escrows
            .get(&id)
            .cloned()
            .ok_or(ConsensusError::UnknownEscrow)?;

        if escrow.state != EscrowStatus::Locked {
            return Err(ConsensusError::EscrowAlreadySettled);
        }
        if !release && block_index < escrow.expiry_block {
            return Err(ConsensusError::EscrowNotExpired);
        }

        self.debit_sender(tx, timestamp)?;

        let payout_target = if release { escrow.recipient.unwrap_or(escrow.submitter) } else { escrow.submitter };
        self.credit(&payout_target, escrow.amount, timestamp)?;

        let updated = self.escrows.get_mut(&id).expect("checked above");
        updated.state = if release { EscrowStatus::Released } else { EscrowStatus::Refunded };
        updated.settled_block = Some(block_index);
        updated.settlement_tx = Some(crate::hash::sha256_multi(&[&tx.from, &tx.to, &tx.nonce.to_le_bytes()]));
        Ok(())
    }

    /// Serialize the current accounts/escrows into a `WriteBatch` for atomic
    /// persistence via `store::KvStore::commit_batch`.
    pub fn to_write_batch(&self) -> Result<WriteBatch> {
        let mut batch = WriteBatch::new();
        for (addr, account) in &self.accounts {
            let bytes = rmp_serde::to_vec(account).map_err(|e| ConsensusError::CodecError(e.to_string()))?;
            batch.put_state(keys::account(addr), bytes);
        }
        for (id, escrow) in &self.escrows {
            let bytes = rmp_serde::to_vec(escrow).map_err(|e| ConsensusError::CodecError(e.to_string()))?;
            batch.put_state(keys::escrow(id), bytes);
        }
        Ok(batch)
    }
}

fn decode_problem_submission_data(data: &[u8]) -> Result<(Hash, u32)> {
    if data.len() != 36 {
        return Err(ConsensusError::InvalidInput(
            "problem submission data must be 36 bytes (hash + expiry offset)".into(),
        ));
    }
    let mut problem_hash = [0u8; 32];
    problem_hash.copy_from_slice(&data[0..32]);
    let expiry_offset = u32::from_le_bytes(data[32..36].try_into().unwrap());
    Ok((problem_hash, expiry_offset))
}

fn decode_bounty_payment_data(data: &[u8]) -> Result<(Hash, bool)> {
    if data.len() != 33 {
        return Err(ConsensusError::InvalidInput(
            "bounty payment data must be 33 bytes (escrow id + action)".into(),
        ));
    }
    let mut id = [0u8; 32];
    id.copy_from_slice(&data[0..32]);
    let release = match data[32] {
        0 => true,
        1 => false,
        _ => return Err(ConsensusError::InvalidInput("bounty payment action must be 0 or 1".into())),
    };
    Ok((id, release))
}

fn problem_submission_escrow_id(tx: &Transaction, block_index: u32) -> Option<Hash> {
    let (problem_hash, _) = decode_problem_submission_data(&tx.data).ok()?;
    Some(sha256_multi(&[&tx.from, &problem_hash, &block_index.to_le_bytes()]))
}

fn bounty_payment_escrow_id(tx: &Transaction) -> Option<Hash> {
    decode_bounty_payment_data(&tx.data).ok().map(|(id, _)| id)
}

/// Integer-PPM fee split (§4.6, §8 scenario 3): burn and treasury take their
/// floored PPM share; the producer absorbs the rounding remainder so the
/// three shares always sum back to exactly `fee`.
fn split_fee(fee: Amount, params: &ConsensusParams) -> (Amount, Amount, Amount) {
    let burn_share = (fee as u128 * params.burn_fee_ppm as u128 / 1_000_000) as Amount;
    let treasury_share = (fee as u128 * params.treasury_fee_ppm as u128 / 1_000_000) as Amount;
    let producer_share = fee.saturating_sub(burn_share).saturating_sub(treasury_share);
    (producer_share, burn_share, treasury_share)
}
