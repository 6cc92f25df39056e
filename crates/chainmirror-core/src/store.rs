//! Block store contract and the in-memory backend.
//!
//! The store is the only resource shared between the sync engine and
//! concurrent readers. Every operation is atomic per key; `upsert` for a hash
//! that is already present is a silent no-op, so duplicate writes from
//! overlapping backfill batches and cache-aside fills are harmless.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::MirrorError;
use crate::types::{Block, BlockKey};

/// Trait for durable block storage.
///
/// Implementations include [`MemoryBlockStore`], `SqliteBlockStore` and
/// `PostgresBlockStore`.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Insert a block unless one with the same hash exists (first write wins).
    async fn upsert(&self, block: &Block) -> Result<(), MirrorError>;

    async fn get_by_height(&self, height: u64) -> Result<Option<Block>, MirrorError>;

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError>;

    /// Blocks with `start <= timestamp <= end`, ascending by timestamp.
    async fn get_by_time_range(&self, start: i64, end: i64) -> Result<Vec<Block>, MirrorError>;

    /// The stored block with the greatest height.
    async fn get_highest(&self) -> Result<Option<Block>, MirrorError>;

    /// Point lookup by either key kind.
    async fn get(&self, key: &BlockKey) -> Result<Option<Block>, MirrorError> {
        match key {
            BlockKey::Height(height) => self.get_by_height(*height).await,
            BlockKey::Hash(hash) => self.get_by_hash(hash).await,
        }
    }
}

// ─── In-memory store ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    by_height: BTreeMap<u64, Block>,
    by_hash: HashMap<String, u64>,
}

/// In-memory block store for tests and ephemeral mirrors.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryBlockStore {
    inner: Mutex<Inner>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.by_height.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored heights in ascending order.
    pub fn heights(&self) -> Vec<u64> {
        self.lock()
            .map(|inner| inner.by_height.keys().copied().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, MirrorError> {
        self.inner
            .lock()
            .map_err(|_| MirrorError::Storage("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn upsert(&self, block: &Block) -> Result<(), MirrorError> {
        let mut inner = self.lock()?;
        if inner.by_hash.contains_key(&block.hash) {
            return Ok(());
        }
        if let Some(existing) = inner.by_height.get(&block.height) {
            return Err(MirrorError::Storage(format!(
                "height {} already holds block {}",
                block.height, existing.hash
            )));
        }
        inner.by_hash.insert(block.hash.clone(), block.height);
        inner.by_height.insert(block.height, block.clone());
        Ok(())
    }

    async fn get_by_height(&self, height: u64) -> Result<Option<Block>, MirrorError> {
        Ok(self.lock()?.by_height.get(&height).cloned())
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError> {
        let inner = self.lock()?;
        Ok(inner
            .by_hash
            .get(hash)
            .and_then(|height| inner.by_height.get(height))
            .cloned())
    }

    async fn get_by_time_range(&self, start: i64, end: i64) -> Result<Vec<Block>, MirrorError> {
        let inner = self.lock()?;
        let mut blocks: Vec<Block> = inner
            .by_height
            .values()
            .filter(|b| b.within(start, end))
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.timestamp);
        Ok(blocks)
    }

    async fn get_highest(&self) -> Result<Option<Block>, MirrorError> {
        Ok(self.lock()?.by_height.values().next_back().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64, hash: &str, timestamp: i64) -> Block {
        Block {
            hash: hash.into(),
            height,
            timestamp,
            protocol_version: None,
            author: None,
            parent: None,
            transactions: vec![],
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryBlockStore::new();
        let b = block(1, "0xa", 1_000);
        store.upsert(&b).await.unwrap();
        store.upsert(&b).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_height(1).await.unwrap().unwrap(), b);
    }

    #[tokio::test]
    async fn first_write_wins() {
        let store = MemoryBlockStore::new();
        store.upsert(&block(1, "0xa", 1_000)).await.unwrap();
        // same hash, different content: ignored
        store.upsert(&block(1, "0xa", 9_999)).await.unwrap();
        assert_eq!(store.get_by_hash("0xa").await.unwrap().unwrap().timestamp, 1_000);
    }

    #[tokio::test]
    async fn conflicting_height_is_storage_error() {
        let store = MemoryBlockStore::new();
        store.upsert(&block(1, "0xa", 1_000)).await.unwrap();
        let err = store.upsert(&block(1, "0xb", 1_000)).await.unwrap_err();
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn lookups_by_key() {
        let store = MemoryBlockStore::new();
        store.upsert(&block(7, "0x7", 70)).await.unwrap();
        assert!(store.get(&BlockKey::Height(7)).await.unwrap().is_some());
        assert!(store.get(&BlockKey::from("0x7")).await.unwrap().is_some());
        assert!(store.get(&BlockKey::Height(8)).await.unwrap().is_none());
        assert!(store.get_by_hash("0x8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn time_range_inclusive_and_ordered() {
        let store = MemoryBlockStore::new();
        for h in [3u64, 1, 2, 4] {
            store.upsert(&block(h, &format!("0x{h}"), h as i64 * 100)).await.unwrap();
        }
        let blocks = store.get_by_time_range(200, 300).await.unwrap();
        let heights: Vec<u64> = blocks.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![2, 3]);
    }

    #[tokio::test]
    async fn highest_block() {
        let store = MemoryBlockStore::new();
        assert!(store.get_highest().await.unwrap().is_none());
        store.upsert(&block(5, "0x5", 5)).await.unwrap();
        store.upsert(&block(9, "0x9", 9)).await.unwrap();
        store.upsert(&block(2, "0x2", 2)).await.unwrap();
        assert_eq!(store.get_highest().await.unwrap().unwrap().height, 9);
        assert_eq!(store.heights(), vec![2, 5, 9]);
    }
}
