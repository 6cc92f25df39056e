//! Cache-aside read path.
//!
//! Every lookup consults the [`BlockStore`] first and only falls through to
//! the [`BlockSource`] on a miss, writing the fetched block back before
//! returning it. Store failures degrade to "no caching": a failed store read
//! is a miss, and a failed write-back is reported next to the result instead
//! of failing the read.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{SyncConfig, MAX_RECENT};
use crate::error::MirrorError;
use crate::source::BlockSource;
use crate::store::BlockStore;
use crate::types::{Block, BlockKey};

/// Outcome of writing a remotely fetched block back to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteBack {
    Persisted,
    /// The store rejected the write; the block is still served.
    Failed(String),
}

/// Where a resolved block came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Served from the store without a remote call.
    Store,
    /// Fetched from the remote source.
    Remote(WriteBack),
}

/// A block found by [`BlockReader::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub block: Block,
    pub origin: Origin,
}

/// Read API over a store and a remote source.
///
/// Cheap to clone; clones share the same store and source.
#[derive(Clone)]
pub struct BlockReader {
    store: Arc<dyn BlockStore>,
    source: Arc<dyn BlockSource>,
    max_scan: u32,
}

impl BlockReader {
    pub fn new(store: Arc<dyn BlockStore>, source: Arc<dyn BlockSource>, config: &SyncConfig) -> Self {
        Self {
            store,
            source,
            max_scan: config.max_scan,
        }
    }

    /// Two-stage lookup: store, then remote with write-back.
    ///
    /// `Ok(None)` means the remote source does not have the block.
    pub async fn resolve(&self, key: &BlockKey) -> Result<Option<Resolved>, MirrorError> {
        match self.store.get(key).await {
            Ok(Some(block)) => {
                return Ok(Some(Resolved {
                    block,
                    origin: Origin::Store,
                }))
            }
            Ok(None) => {}
            Err(e) => warn!(%key, error = %e, "store read failed, treating as miss"),
        }

        let Some(block) = self.source.fetch(key).await? else {
            debug!(%key, "block not found on remote source");
            return Ok(None);
        };
        let write_back = self.write_back(&block).await;
        Ok(Some(Resolved {
            block,
            origin: Origin::Remote(write_back),
        }))
    }

    /// Best-effort persist of a freshly fetched block.
    async fn write_back(&self, block: &Block) -> WriteBack {
        match self.store.upsert(block).await {
            Ok(()) => WriteBack::Persisted,
            Err(e) => {
                warn!(height = block.height, hash = %block.hash, error = %e, "write-back failed");
                WriteBack::Failed(e.to_string())
            }
        }
    }

    async fn resolve_block(&self, key: BlockKey) -> Result<Option<Block>, MirrorError> {
        Ok(self.resolve(&key).await?.map(|r| r.block))
    }

    pub async fn by_height(&self, height: u64) -> Result<Option<Block>, MirrorError> {
        self.resolve_block(BlockKey::Height(height)).await
    }

    pub async fn by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError> {
        self.resolve_block(BlockKey::Hash(hash.to_string())).await
    }

    /// The current tip, written back to the store.
    ///
    /// If the remote source is unreachable the store's highest block is served
    /// instead; the remote error only surfaces when the store is empty too.
    pub async fn latest(&self) -> Result<Block, MirrorError> {
        match self.source.fetch_tip().await {
            Ok(tip) => {
                self.write_back(&tip).await;
                Ok(tip)
            }
            Err(remote) => match self.store.get_highest().await {
                Ok(Some(block)) => {
                    warn!(error = %remote, height = block.height, "tip fetch failed, serving stored highest block");
                    Ok(block)
                }
                Ok(None) => Err(remote),
                Err(e) => {
                    warn!(error = %e, "store read failed");
                    Err(remote)
                }
            },
        }
    }

    /// The last `n` blocks up to the tip, ascending by height.
    ///
    /// Heights the remote source does not have are skipped.
    pub async fn recent(&self, n: usize) -> Result<Vec<Block>, MirrorError> {
        if n == 0 || n > MAX_RECENT {
            return Err(MirrorError::InvalidArgument(format!(
                "n must be between 1 and {MAX_RECENT}, got {n}"
            )));
        }
        let tip = self.latest().await?.height;
        let mut blocks = Vec::with_capacity(n);
        for offset in 0..n as u64 {
            let Some(height) = tip.checked_sub(offset) else {
                break;
            };
            if let Some(block) = self.by_height(height).await? {
                blocks.push(block);
            }
        }
        blocks.sort_by_key(|b| b.height);
        Ok(blocks)
    }

    /// Blocks with `start <= timestamp <= end`, ascending by height.
    ///
    /// A non-empty store result is trusted as complete for the range. Otherwise
    /// the chain is walked backwards from the tip, at most `max_scan` blocks,
    /// stopping at the first block older than `start`.
    pub async fn by_time_range(&self, start: i64, end: i64) -> Result<Vec<Block>, MirrorError> {
        if start > end {
            return Err(MirrorError::InvalidArgument(format!(
                "start ({start}) must not exceed end ({end})"
            )));
        }

        match self.store.get_by_time_range(start, end).await {
            Ok(mut blocks) if !blocks.is_empty() => {
                blocks.sort_by_key(|b| b.height);
                return Ok(blocks);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "store range query failed, walking remote chain"),
        }

        let tip = self.latest().await?.height;
        let mut blocks = Vec::new();
        let mut height = tip;
        let mut scanned = 0u32;
        while scanned < self.max_scan {
            let Some(block) = self.by_height(height).await? else {
                break;
            };
            if block.timestamp < start {
                break;
            }
            if block.within(start, end) {
                blocks.push(block);
            }
            scanned += 1;
            match height.checked_sub(1) {
                Some(next) => height = next,
                None => break,
            }
        }
        debug!(start, end, scanned, found = blocks.len(), "time range walk finished");

        blocks.sort_by_key(|b| b.height);
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::source::MemoryBlockSource;
    use crate::store::MemoryBlockStore;
    use crate::types::ParentRef;

    fn block(height: u64) -> Block {
        Block {
            hash: format!("0x{height:04x}"),
            height,
            timestamp: 1_000 + height as i64 * 10,
            protocol_version: Some(1),
            author: None,
            parent: height.checked_sub(1).map(|p| ParentRef {
                hash: format!("0x{p:04x}"),
                height: p,
            }),
            transactions: vec![],
        }
    }

    fn chain(tip: u64) -> Arc<MemoryBlockSource> {
        Arc::new(MemoryBlockSource::new((0..=tip).map(block)))
    }

    fn reader(store: Arc<dyn BlockStore>, source: Arc<MemoryBlockSource>) -> BlockReader {
        BlockReader::new(store, source, &SyncConfig::default())
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl BlockStore for BrokenStore {
        async fn upsert(&self, _: &Block) -> Result<(), MirrorError> {
            Err(MirrorError::Storage("disk full".into()))
        }
        async fn get_by_height(&self, _: u64) -> Result<Option<Block>, MirrorError> {
            Err(MirrorError::Storage("connection reset".into()))
        }
        async fn get_by_hash(&self, _: &str) -> Result<Option<Block>, MirrorError> {
            Err(MirrorError::Storage("connection reset".into()))
        }
        async fn get_by_time_range(&self, _: i64, _: i64) -> Result<Vec<Block>, MirrorError> {
            Err(MirrorError::Storage("connection reset".into()))
        }
        async fn get_highest(&self) -> Result<Option<Block>, MirrorError> {
            Err(MirrorError::Storage("connection reset".into()))
        }
    }

    // ── resolve ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn cache_hit_skips_remote() {
        let store = Arc::new(MemoryBlockStore::new());
        store.upsert(&block(5)).await.unwrap();
        let source = chain(10);
        let reader = reader(store, source.clone());

        let resolved = reader.resolve(&BlockKey::Height(5)).await.unwrap().unwrap();
        assert_eq!(resolved.origin, Origin::Store);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn cache_miss_fills_store() {
        let store = Arc::new(MemoryBlockStore::new());
        let source = chain(10);
        let reader = reader(store.clone(), source.clone());

        let resolved = reader.resolve(&BlockKey::from("0x0007")).await.unwrap().unwrap();
        assert_eq!(resolved.block.height, 7);
        assert_eq!(resolved.origin, Origin::Remote(WriteBack::Persisted));
        assert_eq!(store.get_by_hash("0x0007").await.unwrap().unwrap(), block(7));

        // second read is a hit
        reader.by_height(7).await.unwrap().unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_hash_is_none_not_error() {
        let reader = reader(Arc::new(MemoryBlockStore::new()), chain(3));
        assert!(reader.by_hash("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn broken_store_still_answers() {
        let source = chain(3);
        let reader = reader(Arc::new(BrokenStore), source.clone());

        let resolved = reader.resolve(&BlockKey::Height(2)).await.unwrap().unwrap();
        assert_eq!(resolved.block, block(2));
        assert!(matches!(resolved.origin, Origin::Remote(WriteBack::Failed(_))));
    }

    #[tokio::test]
    async fn remote_error_propagates_on_miss() {
        let source = chain(3);
        source.fail_height(2);
        let reader = reader(Arc::new(MemoryBlockStore::new()), source);
        assert!(reader.by_height(2).await.unwrap_err().is_remote());
    }

    // ── latest ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn latest_writes_back_tip() {
        let store = Arc::new(MemoryBlockStore::new());
        let reader = reader(store.clone(), chain(4));
        assert_eq!(reader.latest().await.unwrap().height, 4);
        assert!(store.get_by_height(4).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn latest_falls_back_to_store() {
        let store = Arc::new(MemoryBlockStore::new());
        store.upsert(&block(2)).await.unwrap();
        let source = chain(4);
        source.fail_tip(true);
        let reader = reader(store, source);
        assert_eq!(reader.latest().await.unwrap().height, 2);
    }

    #[tokio::test]
    async fn latest_errors_when_nothing_known() {
        let source = chain(4);
        source.fail_tip(true);
        let reader = reader(Arc::new(MemoryBlockStore::new()), source);
        assert!(reader.latest().await.unwrap_err().is_remote());
    }

    // ── recent ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn recent_ascending_and_bounded() {
        let reader = reader(Arc::new(MemoryBlockStore::new()), chain(20));
        let blocks = reader.recent(5).await.unwrap();
        let heights: Vec<u64> = blocks.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![16, 17, 18, 19, 20]);
    }

    #[tokio::test]
    async fn recent_stops_at_genesis() {
        let reader = reader(Arc::new(MemoryBlockStore::new()), chain(2));
        let heights: Vec<u64> = reader.recent(10).await.unwrap().iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn recent_rejects_out_of_range() {
        let reader = reader(Arc::new(MemoryBlockStore::new()), chain(2));
        assert!(matches!(reader.recent(0).await, Err(MirrorError::InvalidArgument(_))));
        assert!(matches!(reader.recent(101).await, Err(MirrorError::InvalidArgument(_))));
        assert!(reader.recent(100).await.is_ok());
    }

    #[tokio::test]
    async fn recent_uses_cache() {
        let store = Arc::new(MemoryBlockStore::new());
        for h in 0..=20 {
            store.upsert(&block(h)).await.unwrap();
        }
        let source = chain(20);
        let reader = reader(store, source.clone());
        reader.recent(10).await.unwrap();
        // only the tip fetch goes remote
        assert_eq!(source.calls(), 1);
    }

    // ── time range ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn local_range_trusted_without_remote() {
        let store = Arc::new(MemoryBlockStore::new());
        // only height 12 of the range 10..=15 is stored
        store.upsert(&block(12)).await.unwrap();
        let source = chain(20);
        let reader = reader(store, source.clone());

        let blocks = reader.by_time_range(1_100, 1_150).await.unwrap();
        assert_eq!(blocks, vec![block(12)]);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn range_walks_remote_on_empty_store() {
        let store = Arc::new(MemoryBlockStore::new());
        let source = chain(20);
        let reader = reader(store.clone(), source.clone());

        let blocks = reader.by_time_range(1_100, 1_150).await.unwrap();
        let heights: Vec<u64> = blocks.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![10, 11, 12, 13, 14, 15]);

        // tip fetch, then heights 19..=9 (20 was written back by the tip fetch)
        assert_eq!(source.calls(), 12);
        assert!(store.get_by_height(15).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn range_walk_respects_max_scan() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let source = chain(20);
        let config = SyncConfig {
            max_scan: 3,
            ..Default::default()
        };
        let reader = BlockReader::new(store, source, &config);

        // range covers everything, but only 3 blocks are visited
        let heights: Vec<u64> = reader
            .by_time_range(0, i64::MAX)
            .await
            .unwrap()
            .iter()
            .map(|b| b.height)
            .collect();
        assert_eq!(heights, vec![18, 19, 20]);
    }

    #[tokio::test]
    async fn range_walk_reaches_genesis() {
        let reader = reader(Arc::new(MemoryBlockStore::new()), chain(4));
        let blocks = reader.by_time_range(0, 5_000).await.unwrap();
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].height, 0);
    }

    #[tokio::test]
    async fn range_rejects_inverted_bounds() {
        let reader = reader(Arc::new(MemoryBlockStore::new()), chain(4));
        assert!(matches!(
            reader.by_time_range(2_000, 1_000).await,
            Err(MirrorError::InvalidArgument(_))
        ));
    }
}
