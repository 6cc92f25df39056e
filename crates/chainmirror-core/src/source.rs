//! Remote block source contract and an in-memory implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MirrorError;
use crate::types::{Block, BlockKey};

/// Trait for fetching blocks from the authoritative upstream.
///
/// Implementations are thin request/response adapters: one outbound request
/// per call, no retry, caching or rate limiting.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// The highest block currently known to the remote source.
    async fn fetch_tip(&self) -> Result<Block, MirrorError>;

    /// The block at `height`, or `None` if the source has no such height.
    async fn fetch_by_height(&self, height: u64) -> Result<Option<Block>, MirrorError>;

    /// The block with `hash`, or `None` if unknown.
    async fn fetch_by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError>;

    /// Point lookup by either key kind.
    async fn fetch(&self, key: &BlockKey) -> Result<Option<Block>, MirrorError> {
        match key {
            BlockKey::Height(height) => self.fetch_by_height(*height).await,
            BlockKey::Hash(hash) => self.fetch_by_hash(hash).await,
        }
    }
}

// ─── In-memory source (for testing) ───────────────────────────────────────────

/// In-memory block source for tests and demos.
///
/// Serves a fixed chain that can be extended, with per-height and tip failure
/// injection, optional artificial latency, and counters for issued calls and
/// the peak number of calls in flight at once.
#[derive(Default)]
pub struct MemoryBlockSource {
    chain: Mutex<BTreeMap<u64, Block>>,
    failing: Mutex<HashSet<u64>>,
    tip_failing: AtomicBool,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when a call completes.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryBlockSource {
    pub fn new(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            chain: Mutex::new(blocks.into_iter().map(|b| (b.height, b)).collect()),
            ..Default::default()
        }
    }

    /// Delay every call by `latency` so concurrent calls overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append (or replace) a block; the chain tip follows the highest height.
    pub fn push(&self, block: Block) {
        if let Ok(mut chain) = self.chain.lock() {
            chain.insert(block.height, block);
        }
    }

    /// Make every fetch of `height` fail with a remote error.
    pub fn fail_height(&self, height: u64) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(height);
        }
    }

    /// Undo [`fail_height`](Self::fail_height).
    pub fn heal_height(&self, height: u64) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&height);
        }
    }

    /// Toggle failure of `fetch_tip`.
    pub fn fail_tip(&self, fail: bool) {
        self.tip_failing.store(fail, Ordering::SeqCst);
    }

    /// Total calls issued against this source.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight simultaneously.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }

    fn chain(&self) -> Result<MutexGuard<'_, BTreeMap<u64, Block>>, MirrorError> {
        self.chain
            .lock()
            .map_err(|_| MirrorError::Other("memory source lock poisoned".into()))
    }

    fn is_failing(&self, height: u64) -> bool {
        self.failing
            .lock()
            .map(|failing| failing.contains(&height))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BlockSource for MemoryBlockSource {
    async fn fetch_tip(&self) -> Result<Block, MirrorError> {
        let _guard = self.enter().await;
        if self.tip_failing.load(Ordering::SeqCst) {
            return Err(MirrorError::Remote("tip unavailable".into()));
        }
        self.chain()?
            .values()
            .next_back()
            .cloned()
            .ok_or_else(|| MirrorError::Remote("source has no blocks".into()))
    }

    async fn fetch_by_height(&self, height: u64) -> Result<Option<Block>, MirrorError> {
        let _guard = self.enter().await;
        if self.is_failing(height) {
            return Err(MirrorError::Remote(format!("injected failure at height {height}")));
        }
        Ok(self.chain()?.get(&height).cloned())
    }

    async fn fetch_by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError> {
        let _guard = self.enter().await;
        let found = self.chain()?.values().find(|b| b.hash == hash).cloned();
        match found {
            Some(b) if self.is_failing(b.height) => Err(MirrorError::Remote(format!(
                "injected failure at height {}",
                b.height
            ))),
            other => Ok(other),
        }
    }
}
