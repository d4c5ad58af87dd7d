//! Epoch replay cache (§4.10): a persistent, bounded mapping from
//! `(miner_address, commitment)` to the block index at which the pair was
//! first observed. A block whose `(miner_address, commitment)` collides with
//! a live entry is rejected (§3 invariant 6, §8 scenario 5). Entries older
//! than `EPOCH_REPLAY_TTL` blocks fall out of the live window and may be
//! reused - this is the one place besides `state.rs` that mutates inside a
//! block's atomic commit, so reorg naturally restores it (§4.10): rolling
//! state back to a snapshot and rolling this cache back together keeps both
//! consistent with the same parent.

use crate::errors::{ConsensusError, Result};
use crate::store::{keys, KvStore, WriteBatch};
use crate::types::{Address, Hash};
use std::collections::HashMap;

/// In-memory projection of the replay cache, mirroring `state::StateMachine`'s
/// snapshot/restore shape so chain.rs can treat both as one speculative unit
/// during reorg replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayCache {
    entries: HashMap<(Address, Hash), u32>,
}

/// Opaque snapshot handle, same shape as `state::StateSnapshot` (§4.6).
pub type ReplayCacheSnapshot = ReplayCache;

impl ReplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache back out of a `KvStore` written by a prior
    /// `to_write_batch` (node startup / parity harness replay). The whole
    /// map is stored as a single blob under `meta:replay_cache` - small
    /// enough at any one TTL window to make per-entry keys unnecessary.
    pub fn load(store: &dyn KvStore) -> Result<Self> {
        match store.get_state(&keys::replay_cache())? {
            Some(bytes) => {
                let entries: HashMap<(Address, Hash), u32> = rmp_serde::from_slice(&bytes)
                    .map_err(|e| ConsensusError::CodecError(e.to_string()))?;
                Ok(Self { entries })
            }
            None => Ok(Self::new()),
        }
    }

    pub fn snapshot(&self) -> ReplayCacheSnapshot {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: ReplayCacheSnapshot) {
        *self = snapshot;
    }

    /// Check `(miner, commitment)` against the live window and, if clear,
    /// record it at `block_index`. Rejects with the original sighting's
    /// index when a live collision is found (§8 scenario 5).
    pub fn check_and_insert(
        &mut self,
        miner: Address,
        commitment: Hash,
        block_index: u32,
        ttl: u32,
    ) -> Result<()> {
        let key = (miner, commitment);
        if let Some(&first_seen) = self.entries.get(&key) {
            if is_live(first_seen, block_index, ttl) {
                return Err(ConsensusError::CommitmentReplay { first_seen });
            }
        }
        self.entries.insert(key, block_index);
        Ok(())
    }

    /// Drop entries whose TTL window has elapsed relative to `current_index`,
    /// bounding memory/storage growth. Safe to call as often as desired;
    /// callers typically prune once per accepted block.
    pub fn prune(&mut self, current_index: u32, ttl: u32) {
        self.entries.retain(|_, &mut first_seen| is_live(first_seen, current_index, ttl));
    }

    pub fn contains(&self, miner: &Address, commitment: &Hash) -> bool {
        self.entries.contains_key(&(*miner, *commitment))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize into a `WriteBatch` for atomic persistence alongside the
    /// block's header/body/state diff (§6: "Every block commit writes
    /// exactly one atomic batch").
    pub fn to_write_batch(&self) -> Result<WriteBatch> {
        let mut batch = WriteBatch::new();
        let bytes = rmp_serde::to_vec(&self.entries).map_err(|e| ConsensusError::CodecError(e.to_string()))?;
        batch.put_state(keys::replay_cache(), bytes);
        Ok(batch)
    }
}

/// `first_seen` is still within the live replay window as of `current_index`.
fn is_live(first_seen: u32, current_index: u32, ttl: u32) -> bool {
    current_index < first_seen.saturating_add(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[test]
    fn first_use_is_always_accepted() {
        let mut cache = ReplayCache::new();
        assert!(cache.check_and_insert([1u8; 32], [2u8; 32], 100, 50).is_ok());
        assert!(cache.contains(&[1u8; 32], &[2u8; 32]));
    }

    #[test]
    fn replay_within_ttl_window_is_rejected() {
        let mut cache = ReplayCache::new();
        cache.check_and_insert([1u8; 32], [2u8; 32], 100, 50).unwrap();

        let err = cache.check_and_insert([1u8; 32], [2u8; 32], 120, 50).unwrap_err();
        assert!(matches!(err, ConsensusError::CommitmentReplay { first_seen: 100 }));
    }

    #[test]
    fn replay_after_ttl_expires_is_accepted() {
        let mut cache = ReplayCache::new();
        cache.check_and_insert([1u8; 32], [2u8; 32], 100, 50).unwrap();
        assert!(cache.check_and_insert([1u8; 32], [2u8; 32], 151, 50).is_ok());
    }

    #[test]
    fn different_miner_or_commitment_does_not_collide() {
        let mut cache = ReplayCache::new();
        cache.check_and_insert([1u8; 32], [2u8; 32], 100, 50).unwrap();
        assert!(cache.check_and_insert([9u8; 32], [2u8; 32], 101, 50).is_ok());
        assert!(cache.check_and_insert([1u8; 32], [9u8; 32], 101, 50).is_ok());
    }

    #[test]
    fn prune_drops_entries_outside_the_ttl_window() {
        let mut cache = ReplayCache::new();
        cache.check_and_insert([1u8; 32], [2u8; 32], 10, 50).unwrap();
        cache.prune(100, 50);
        assert!(!cache.contains(&[1u8; 32], &[2u8; 32]));
    }

    #[test]
    fn snapshot_and_restore_discards_speculative_inserts() {
        let mut cache = ReplayCache::new();
        cache.check_and_insert([1u8; 32], [2u8; 32], 1, 50).unwrap();
        let snapshot = cache.snapshot();

        cache.check_and_insert([3u8; 32], [4u8; 32], 2, 50).unwrap();
        assert_eq!(cache.len(), 2);

        cache.restore(snapshot);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn write_batch_round_trips_through_a_store() {
        let mut cache = ReplayCache::new();
        cache.check_and_insert([1u8; 32], [2u8; 32], 7, 50).unwrap();

        let store = MemStore::new();
        store.commit_batch(cache.to_write_batch().unwrap()).unwrap();

        let loaded = ReplayCache::load(&store).unwrap();
        assert!(loaded.contains(&[1u8; 32], &[2u8; 32]));
    }
}
