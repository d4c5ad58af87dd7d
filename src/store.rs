//! Persistence layer (§6, §A.4): a key-value store with atomic batch writes
//! over three logical keyspaces (`headers`, `bodies`, `state`). Spec §1
//! explicitly leaves the engine unpinned ("assumes a key-value store with
//! atomic batch writes"); this module follows the teacher
//! (`network-b/state/src/accounts.rs`, `escrows.rs`) in choosing `redb`.
//!
//! Every block commit (header, body, state diff, replay-cache delta, tip
//! pointer) goes through exactly one `commit_batch` call, so a crash between
//! writes can never leave the keyspaces inconsistent with each other.

use crate::errors::{ConsensusError, Result};
use crate::types::Hash;
use redb::{Database, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

const HEADERS_TABLE: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("headers");
const BODIES_TABLE: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("bodies");
const STATE_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("state");

/// One atomic unit of work across all three keyspaces. `state_writes` entries
/// with value `None` delete the key (used for escrow/account pruning paths,
/// if any ever arise - today nothing deletes state, but the shape is
/// correct for the general key-value contract §6 describes).
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub headers: Vec<(Hash, Vec<u8>)>,
    pub bodies: Vec<(Hash, Vec<u8>)>,
    pub state_writes: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_header(&mut self, hash: Hash, bytes: Vec<u8>) {
        self.headers.push((hash, bytes));
    }

    pub fn put_body(&mut self, hash: Hash, bytes: Vec<u8>) {
        self.bodies.push((hash, bytes));
    }

    pub fn put_state(&mut self, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        self.state_writes.push((key.into(), Some(value)));
    }

    pub fn delete_state(&mut self, key: impl Into<Vec<u8>>) {
        self.state_writes.push((key.into(), None));
    }
}

/// Well-known `state` keyspace key helpers (§6).
pub mod keys {
    pub fn account(addr: &[u8; 32]) -> Vec<u8> {
        [b"account:".as_slice(), addr].concat()
    }

    pub fn escrow(id: &[u8; 32]) -> Vec<u8> {
        [b"escrow:".as_slice(), id].concat()
    }

    pub fn tip() -> Vec<u8> {
        b"meta:tip".to_vec()
    }

    pub fn replay_cache() -> Vec<u8> {
        b"meta:replay_cache".to_vec()
    }

    pub fn validators() -> Vec<u8> {
        b"meta:validators".to_vec()
    }
}

/// The persistence contract every storage backend must satisfy.
pub trait KvStore: Send + Sync {
    fn get_header(&self, hash: &Hash) -> Result<Option<Vec<u8>>>;
    fn get_body(&self, hash: &Hash) -> Result<Option<Vec<u8>>>;
    fn get_state(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// Apply every write in `batch` atomically: all of it lands, or none of
    /// it does (§6, §7 Transient classification on failure).
    fn commit_batch(&self, batch: WriteBatch) -> Result<()>;
}

// ==================== REDB BACKEND ====================

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path).map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        let write_txn = db
            .begin_write()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        {
            write_txn
                .open_table(HEADERS_TABLE)
                .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            write_txn
                .open_table(BODIES_TABLE)
                .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            write_txn
                .open_table(STATE_TABLE)
                .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get_header(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        let table = txn
            .open_table(HEADERS_TABLE)
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        Ok(table
            .get(hash)
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?
            .map(|v| v.value().to_vec()))
    }

    fn get_body(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        let table = txn
            .open_table(BODIES_TABLE)
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        Ok(table
            .get(hash)
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?
            .map(|v| v.value().to_vec()))
    }

    fn get_state(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        let table = txn
            .open_table(STATE_TABLE)
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        Ok(table
            .get(key)
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?
            .map(|v| v.value().to_vec()))
    }

    fn commit_batch(&self, batch: WriteBatch) -> Result<()> {
        let result = self.commit_batch_inner(batch);
        if let Err(e) = &result {
            tracing::error!(target: "coinjecture_core::store", error = %e, "storage batch commit failed");
        }
        result
    }
}

impl RedbStore {
    fn commit_batch_inner(&self, batch: WriteBatch) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        {
            let mut headers = write_txn
                .open_table(HEADERS_TABLE)
                .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            for (hash, bytes) in &batch.headers {
                headers
                    .insert(hash, bytes.as_slice())
                    .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            }

            let mut bodies = write_txn
                .open_table(BODIES_TABLE)
                .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            for (hash, bytes) in &batch.bodies {
                bodies
                    .insert(hash, bytes.as_slice())
                    .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            }

            let mut state = write_txn
                .open_table(STATE_TABLE)
                .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
            for (key, value) in &batch.state_writes {
                match value {
                    Some(bytes) => {
                        state
                            .insert(key.as_slice(), bytes.as_slice())
                            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
                    }
                    None => {
                        state
                            .remove(key.as_slice())
                            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
                    }
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| ConsensusError::StorageWriteFailed(e.to_string()))?;
        Ok(())
    }
}

// ==================== IN-MEMORY BACKEND ====================

/// In-memory `KvStore`, used by tests and the parity harness (§A.4, §A.5):
/// same atomicity contract (a single lock guards all three keyspaces per
/// commit), no disk involved.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<MemStoreInner>,
}

#[derive(Default)]
struct MemStoreInner {
    headers: HashMap<Hash, Vec<u8>>,
    bodies: HashMap<Hash, Vec<u8>>,
    state: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemStore {
    fn get_header(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().unwrap().headers.get(hash).cloned())
    }

    fn get_body(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().unwrap().bodies.get(hash).cloned())
    }

    fn get_state(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().unwrap().state.get(key).cloned())
    }

    fn commit_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for (hash, bytes) in batch.headers {
            inner.headers.insert(hash, bytes);
        }
        for (hash, bytes) in batch.bodies {
            inner.bodies.insert(hash, bytes);
        }
        for (key, value) in batch.state_writes {
            match value {
                Some(bytes) => {
                    inner.state.insert(key, bytes);
                }
                None => {
                    inner.state.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_store_round_trips_header() {
        let store = MemStore::new();
        let hash = [1u8; 32];
        let mut batch = WriteBatch::new();
        batch.put_header(hash, vec![1, 2, 3]);
        store.commit_batch(batch).unwrap();
        assert_eq!(store.get_header(&hash).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn mem_store_state_key_helpers_round_trip() {
        let store = MemStore::new();
        let addr = [9u8; 32];
        let mut batch = WriteBatch::new();
        batch.put_state(keys::account(&addr), vec![42]);
        store.commit_batch(batch).unwrap();
        assert_eq!(store.get_state(&keys::account(&addr)).unwrap(), Some(vec![42]));
    }

    #[test]
    fn mem_store_delete_removes_key() {
        let store = MemStore::new();
        let mut batch = WriteBatch::new();
        batch.put_state(keys::tip(), vec![1]);
        store.commit_batch(batch).unwrap();

        let mut delete_batch = WriteBatch::new();
        delete_batch.delete_state(keys::tip());
        store.commit_batch(delete_batch).unwrap();

        assert_eq!(store.get_state(&keys::tip()).unwrap(), None);
    }

    #[test]
    fn redb_store_round_trips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");
        let store = RedbStore::open(&path).unwrap();

        let hash = [3u8; 32];
        let mut batch = WriteBatch::new();
        batch.put_header(hash, vec![7, 7, 7]);
        batch.put_body(hash, vec![8, 8, 8]);
        batch.put_state(keys::tip(), vec![0, 0, 0, 1]);
        store.commit_batch(batch).unwrap();

        assert_eq!(store.get_header(&hash).unwrap(), Some(vec![7, 7, 7]));
        assert_eq!(store.get_body(&hash).unwrap(), Some(vec![8, 8, 8]));
        assert_eq!(store.get_state(&keys::tip()).unwrap(), Some(vec![0, 0, 0, 1]));
    }
}
