//! Priority-ordered pending transaction pool (§4.7). Grounded in the
//! teacher's `network-b/mempool/src/pool.rs`: a `BinaryHeap` ordered by
//! `(gas_price, arrival order)` with a `Reverse`-wrapped min-heap view for
//! low-priority eviction, generalized to this crate's `Transaction`/
//! `ConsensusError`/`ConsensusParams` types and to admission rules that
//! consult account state (nonce, balance) rather than signature alone.

use crate::codec::{compute_transaction_hash, encode_transaction};
use crate::config::ConsensusParams;
use crate::errors::{ConsensusError, Result};
use crate::state::StateMachine;
use crate::transaction::verify_transaction;
use crate::types::{Hash, Transaction};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A transaction plus the metadata the priority order and eviction logic
/// need, decoupled from the wire representation.
#[derive(Clone, Debug)]
struct PooledTransaction {
    tx: Transaction,
    tx_hash: Hash,
    arrival_index: u64,
    size_bytes: usize,
}

impl PartialEq for PooledTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.tx_hash == other.tx_hash
    }
}

impl Eq for PooledTransaction {}

impl PartialOrd for PooledTransaction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PooledTransaction {
    /// Higher `gas_price` wins; ties broken by earlier arrival (§4.7: "priority
    /// ordered by (gas_price descending, arrival index ascending)").
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.tx.gas_price.cmp(&other.tx.gas_price) {
            std::cmp::Ordering::Equal => other.arrival_index.cmp(&self.arrival_index),
            ordering => ordering,
        }
    }
}

/// Pool-level statistics, mirroring the teacher's `PoolStats` shape.
#[derive(Clone, Debug, Default)]
pub struct PoolStats {
    pub total_transactions: usize,
    pub total_bytes: usize,
    pub transactions_added: u64,
    pub transactions_removed: u64,
    pub transactions_rejected: u64,
}

/// Priority-ordered pending-transaction pool.
pub struct Mempool {
    queue: BinaryHeap<PooledTransaction>,
    by_hash: HashMap<Hash, Transaction>,
    seen: HashSet<Hash>,
    params: ConsensusParams,
    stats: PoolStats,
    current_size: usize,
    next_arrival_index: u64,
}

impl Mempool {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            queue: BinaryHeap::new(),
            by_hash: HashMap::new(),
            seen: HashSet::new(),
            params,
            stats: PoolStats::default(),
            current_size: 0,
            next_arrival_index: 0,
        }
    }

    /// Admit a transaction at `now` against the account state at the
    /// current chain tip (§4.7 admission rules: valid signature, nonce not
    /// behind the account, sufficient balance, not expired, pool not full).
    pub fn add(&mut self, tx: Transaction, state: &StateMachine, now: i64) -> Result<Hash> {
        let tx_hash = compute_transaction_hash(&tx)?;

        if self.seen.contains(&tx_hash) {
            self.stats.transactions_rejected += 1;
            return Err(ConsensusError::DuplicateTransaction {
                hash: hex::encode(tx_hash),
            });
        }

        let age_secs = now.saturating_sub(tx.timestamp);
        if age_secs > self.params.mempool_max_age_secs {
            self.stats.transactions_rejected += 1;
            return Err(ConsensusError::TransactionExpired {
                age_secs,
                max_secs: self.params.mempool_max_age_secs,
            });
        }

        if let Err(e) = verify_transaction(&tx) {
            self.stats.transactions_rejected += 1;
            return Err(e);
        }

        let account = state.get_account(&tx.from);
        if tx.nonce < account.nonce {
            self.stats.transactions_rejected += 1;
            return Err(ConsensusError::NonceMismatch {
                expected: account.nonce,
                got: tx.nonce,
            });
        }

        let cost = tx
            .amount
            .checked_add(tx.fee)
            .ok_or(ConsensusError::AmountOverflow)?;
        if account.balance < cost {
            self.stats.transactions_rejected += 1;
            return Err(ConsensusError::InsufficientBalance {
                have: account.balance,
                need: cost,
            });
        }

        let tx_size = encode_transaction(&tx)?.len();

        if self.stats.total_transactions >= self.params.mempool_max_transactions
            || self.current_size + tx_size > self.params.mempool_max_bytes
        {
            let can_evict = self
                .queue
                .peek()
                .map(|lowest| tx.gas_price > lowest.tx.gas_price)
                .unwrap_or(false);
            if can_evict {
                self.evict_lowest();
            } else {
                self.stats.transactions_rejected += 1;
                return Err(ConsensusError::PoolFull {
                    current: self.stats.total_transactions,
                    max: self.params.mempool_max_transactions,
                });
            }
        }

        let pooled = PooledTransaction {
            tx: tx.clone(),
            tx_hash,
            arrival_index: self.next_arrival_index,
            size_bytes: tx_size,
        };
        self.next_arrival_index += 1;

        self.queue.push(pooled);
        self.by_hash.insert(tx_hash, tx);
        self.seen.insert(tx_hash);

        self.stats.total_transactions = self.queue.len();
        self.stats.total_bytes += tx_size;
        self.stats.transactions_added += 1;
        self.current_size += tx_size;

        Ok(tx_hash)
    }

    /// Pending transactions ordered highest-`gas_price`-first, for block
    /// assembly.
    pub fn get_pending(&self) -> Vec<Transaction> {
        let mut sorted: Vec<_> = self.queue.iter().cloned().collect();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted.into_iter().map(|p| p.tx).collect()
    }

    pub fn get_top_n(&self, n: usize) -> Vec<Transaction> {
        self.get_pending().into_iter().take(n).collect()
    }

    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        self.by_hash.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.seen.contains(hash)
    }

    /// Drop a transaction from the pool, e.g. once it lands in a block.
    pub fn remove(&mut self, hash: &Hash) -> Option<Transaction> {
        let tx = self.by_hash.remove(hash)?;
        self.seen.remove(hash);

        let removed: Vec<_> = self.queue.drain().collect();
        let mut removed_size = 0usize;
        self.queue = removed
            .into_iter()
            .filter(|p| {
                if &p.tx_hash == hash {
                    removed_size = p.size_bytes;
                    false
                } else {
                    true
                }
            })
            .collect();

        self.stats.total_transactions = self.queue.len();
        self.stats.total_bytes = self.stats.total_bytes.saturating_sub(removed_size);
        self.stats.transactions_removed += 1;
        self.current_size = self.current_size.saturating_sub(removed_size);

        Some(tx)
    }

    /// Remove every transaction that landed in a mined block.
    pub fn remove_batch(&mut self, hashes: &[Hash]) {
        for hash in hashes {
            self.remove(hash);
        }
    }

    /// Return reverted transactions (from a reorg) to the pool for
    /// re-inclusion, skipping any that have since become duplicates (§4.8:
    /// "reverted transactions return to the mempool").
    pub fn reinstate(&mut self, txs: Vec<Transaction>, state: &StateMachine, now: i64) {
        for tx in txs {
            let _ = self.add(tx, state, now);
        }
    }

    fn evict_lowest(&mut self) {
        let mut min_heap: BinaryHeap<Reverse<PooledTransaction>> =
            self.queue.drain().map(Reverse).collect();

        if let Some(Reverse(lowest)) = min_heap.pop() {
            self.by_hash.remove(&lowest.tx_hash);
            self.seen.remove(&lowest.tx_hash);
            self.stats.transactions_removed += 1;
            self.stats.total_bytes = self.stats.total_bytes.saturating_sub(lowest.size_bytes);
            self.current_size = self.current_size.saturating_sub(lowest.size_bytes);
        }

        self.queue = min_heap.into_iter().map(|Reverse(p)| p).collect();
        self.stats.total_transactions = self.queue.len();
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.by_hash.clear();
        self.seen.clear();
        self.stats.total_transactions = 0;
        self.stats.total_bytes = 0;
        self.current_size = 0;
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Account;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_tx(signer: &SigningKey, nonce: u64, gas_price: u64, timestamp: i64) -> Transaction {
        let mut tx = Transaction {
            from: signer.verifying_key().to_bytes(),
            to: [2u8; 32],
            amount: 1_000,
            fee: 10,
            nonce,
            gas_limit: 21_000,
            gas_price,
            tx_type: crate::types::TxType::Transfer,
            data: Vec::new(),
            signature: [0u8; 64],
            timestamp,
        };
        let signing_bytes = crate::codec::encode_transaction_signing_bytes(&tx).unwrap();
        tx.signature = signer.sign(&signing_bytes).to_bytes();
        tx
    }

    fn funded_state(addr: [u8; 32]) -> StateMachine {
        let mut state = StateMachine::new();
        state.set_account(Account {
            address: addr,
            balance: 1_000_000,
            nonce: 0,
            created_at: 0,
            updated_at: 0,
        });
        state
    }

    #[test]
    fn admits_a_well_formed_transaction() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut pool = Mempool::new(ConsensusParams::for_tests());

        let tx = signed_tx(&signer, 0, 100, 1000);
        assert!(pool.add(tx, &state, 1000).is_ok());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn rejects_duplicate_transactions() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut pool = Mempool::new(ConsensusParams::for_tests());

        let tx = signed_tx(&signer, 0, 100, 1000);
        pool.add(tx.clone(), &state, 1000).unwrap();
        assert!(matches!(
            pool.add(tx, &state, 1000),
            Err(ConsensusError::DuplicateTransaction { .. })
        ));
    }

    #[test]
    fn rejects_stale_nonce() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let mut state = funded_state(signer.verifying_key().to_bytes());
        state.set_account(Account {
            address: signer.verifying_key().to_bytes(),
            balance: 1_000_000,
            nonce: 5,
            created_at: 0,
            updated_at: 0,
        });
        let mut pool = Mempool::new(ConsensusParams::for_tests());

        let tx = signed_tx(&signer, 1, 100, 1000);
        assert!(matches!(
            pool.add(tx, &state, 1000),
            Err(ConsensusError::NonceMismatch { .. })
        ));
    }

    #[test]
    fn rejects_expired_transactions() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut params = ConsensusParams::for_tests();
        params.mempool_max_age_secs = 10;
        let mut pool = Mempool::new(params);

        let tx = signed_tx(&signer, 0, 100, 1000);
        assert!(matches!(
            pool.add(tx, &state, 2000),
            Err(ConsensusError::TransactionExpired { .. })
        ));
    }

    #[test]
    fn higher_gas_price_evicts_lowest_when_full() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut params = ConsensusParams::for_tests();
        params.mempool_max_transactions = 1;
        let mut pool = Mempool::new(params);

        let low = signed_tx(&signer, 0, 10, 1000);
        let low_hash = compute_transaction_hash(&low).unwrap();
        pool.add(low, &state, 1000).unwrap();

        let high = signed_tx(&signer, 1, 500, 1000);
        pool.add(high, &state, 1000).unwrap();

        assert_eq!(pool.len(), 1);
        assert!(!pool.contains(&low_hash));
    }

    #[test]
    fn full_pool_rejects_lower_priority_transaction() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut params = ConsensusParams::for_tests();
        params.mempool_max_transactions = 1;
        let mut pool = Mempool::new(params);

        let high = signed_tx(&signer, 0, 500, 1000);
        pool.add(high, &state, 1000).unwrap();

        let low = signed_tx(&signer, 1, 10, 1000);
        assert!(matches!(pool.add(low, &state, 1000), Err(ConsensusError::PoolFull { .. })));
    }

    #[test]
    fn get_pending_orders_by_gas_price_descending() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut pool = Mempool::new(ConsensusParams::for_tests());

        pool.add(signed_tx(&signer, 0, 10, 1000), &state, 1000).unwrap();
        pool.add(signed_tx(&signer, 1, 999, 1000), &state, 1000).unwrap();
        pool.add(signed_tx(&signer, 2, 500, 1000), &state, 1000).unwrap();

        let pending = pool.get_pending();
        assert_eq!(pending[0].gas_price, 999);
        assert_eq!(pending[1].gas_price, 500);
        assert_eq!(pending[2].gas_price, 10);
    }

    #[test]
    fn remove_batch_clears_mined_transactions() {
        let signer = SigningKey::from_bytes(&[7u8; 32]);
        let state = funded_state(signer.verifying_key().to_bytes());
        let mut pool = Mempool::new(ConsensusParams::for_tests());

        let tx = signed_tx(&signer, 0, 100, 1000);
        let hash = pool.add(tx, &state, 1000).unwrap();
        pool.remove_batch(&[hash]);
        assert!(pool.is_empty());
    }
}
