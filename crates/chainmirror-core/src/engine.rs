//! The sync engine: backfill, then continuous polling.
//!
//! # Phase 1: BACKFILL
//! Fetch `[start, tip]` in batches of `batch_size`. Heights inside a batch are
//! fetched concurrently; batch N+1 starts only once batch N has drained, so no
//! more than `batch_size` remote calls are ever outstanding.
//!
//! # Phase 2: POLLING
//! Every `poll_interval`, fetch the remote tip and mirror each height between
//! the cursor and the tip in ascending order, then advance the cursor to the
//! tip. Failed heights stay as gaps; readers fill them lazily.

use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{SyncConfig, SyncState, SyncStatus};
use crate::cursor::HeightCursor;
use crate::error::MirrorError;
use crate::source::BlockSource;
use crate::store::BlockStore;

/// Result of mirroring a single height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightOutcome {
    Indexed,
    /// The remote source has no block at this height.
    Missing,
    /// Fetch or persist failed; the height is left as a gap.
    Failed,
}

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub indexed: u64,
    pub missing: u64,
    pub failed: u64,
}

impl SyncCounts {
    fn record(&mut self, outcome: HeightOutcome) {
        match outcome {
            HeightOutcome::Indexed => self.indexed += 1,
            HeightOutcome::Missing => self.missing += 1,
            HeightOutcome::Failed => self.failed += 1,
        }
    }
}

/// Summary of a backfill pass over `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    pub from: u64,
    pub to: u64,
    pub counts: SyncCounts,
}

/// Summary of one polling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tip: u64,
    /// Heights mirrored during this tick; `None` when the tip was not ahead.
    pub range: Option<(u64, u64)>,
    pub counts: SyncCounts,
}

/// Keeps a [`BlockStore`] in step with a [`BlockSource`].
pub struct SyncEngine {
    store: Arc<dyn BlockStore>,
    source: Arc<dyn BlockSource>,
    config: SyncConfig,
    cursor: HeightCursor,
    status: watch::Sender<SyncStatus>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn BlockStore>, source: Arc<dyn BlockSource>, config: SyncConfig) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            state: SyncState::Starting,
            last_known_height: None,
            remote_tip: None,
        });
        Self {
            store,
            source,
            config,
            cursor: HeightCursor::new(),
            status,
        }
    }

    /// The engine's `lastKnownHeight`.
    pub fn last_known_height(&self) -> Option<u64> {
        self.cursor.height()
    }

    pub fn state(&self) -> SyncState {
        self.status.borrow().state
    }

    /// Watch state and cursor changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    fn set_state(&self, state: SyncState) {
        info!(%state, "sync state changed");
        self.status.send_modify(|s| s.state = state);
    }

    fn publish(&self, remote_tip: Option<u64>) {
        let height = self.cursor.height();
        self.status.send_modify(|s| {
            s.last_known_height = height;
            if remote_tip.is_some() {
                s.remote_tip = remote_tip;
            }
        });
    }

    /// Fetch `height` from the remote source and persist it.
    ///
    /// Always goes remote: the caller knows the height is new or missing.
    async fn index_height(&self, height: u64) -> HeightOutcome {
        let block = match self.source.fetch_by_height(height).await {
            Ok(Some(block)) => block,
            Ok(None) => {
                debug!(height, "height not available on remote source");
                return HeightOutcome::Missing;
            }
            Err(e) => {
                warn!(height, error = %e, "failed to fetch block");
                return HeightOutcome::Failed;
            }
        };
        match self.store.upsert(&block).await {
            Ok(()) => {
                debug!(
                    height,
                    hash = %block.hash,
                    txs = block.tx_count(),
                    time = ?block.datetime(),
                    "indexed block"
                );
                HeightOutcome::Indexed
            }
            Err(e) => {
                warn!(height, error = %e, "failed to store block");
                HeightOutcome::Failed
            }
        }
    }

    /// Position the cursor at the store's highest height.
    pub async fn init_cursor(&mut self) -> Result<Option<u64>, MirrorError> {
        if let Some(highest) = self.store.get_highest().await? {
            self.cursor.advance(highest.height);
        }
        self.publish(None);
        Ok(self.cursor.height())
    }

    /// Backfill window: `[highest - backfill_window, tip]`, or
    /// `[start_height, tip]` for an empty store.
    pub async fn backfill_range(&self) -> Result<RangeInclusive<u64>, MirrorError> {
        let start = match self.store.get_highest().await? {
            Some(highest) => highest.height.saturating_sub(self.config.backfill_window),
            None => self.config.start_height,
        };
        let tip = self.source.fetch_tip().await?;
        self.publish(Some(tip.height));
        Ok(start..=tip.height)
    }

    /// Run one backfill pass, then move the cursor to the stored highest height.
    pub async fn backfill(&mut self) -> Result<BackfillReport, MirrorError> {
        self.set_state(SyncState::Backfilling);
        let range = self.backfill_range().await?;
        let (from, to) = (*range.start(), *range.end());
        info!(from, to, "starting backfill");

        let batch = self.config.batch_size.max(1);
        let mut counts = SyncCounts::default();
        let mut current = from;
        while current <= to {
            let batch_end = current.saturating_add(batch - 1).min(to);
            let this = &*self;
            let outcomes = join_all((current..=batch_end).map(move |h| this.index_height(h))).await;
            let mut batch_counts = SyncCounts::default();
            for outcome in outcomes {
                batch_counts.record(outcome);
                counts.record(outcome);
            }
            info!(
                from = current,
                to = batch_end,
                indexed = batch_counts.indexed,
                failed = batch_counts.failed,
                "backfill batch complete"
            );
            if batch_end == u64::MAX {
                break;
            }
            current = batch_end + 1;
        }

        if let Err(e) = self.init_cursor().await {
            warn!(error = %e, "could not read highest stored block after backfill");
        }
        info!(
            from,
            to,
            indexed = counts.indexed,
            missing = counts.missing,
            failed = counts.failed,
            cursor = ?self.cursor.height(),
            "backfill complete"
        );
        Ok(BackfillReport { from, to, counts })
    }

    /// One polling step: mirror every height in `(cursor, tip]`.
    ///
    /// The cursor moves to the tip once all heights were attempted, even if
    /// some of them failed. A tip fetch failure leaves the cursor untouched, and
    /// so does a tip still below `start_height`.
    pub async fn tick(&mut self) -> Result<TickReport, MirrorError> {
        let tip = self.source.fetch_tip().await?.height;
        self.publish(Some(tip));

        let from = self.cursor.next_height(self.config.start_height);
        if !self.cursor.is_behind(tip) || from > tip {
            debug!(tip, next = from, "no new blocks");
            return Ok(TickReport {
                tip,
                range: None,
                counts: SyncCounts::default(),
            });
        }

        info!(tip, previous = ?self.cursor.height(), "new blocks detected");
        let mut counts = SyncCounts::default();
        for height in from..=tip {
            counts.record(self.index_height(height).await);
        }
        self.cursor.advance(tip);
        self.publish(None);

        if counts.failed > 0 {
            warn!(from, to = tip, failed = counts.failed, "tick left gaps");
        }
        Ok(TickReport {
            tip,
            range: Some((from, tip)),
            counts,
        })
    }

    /// Backfill, then poll until `shutdown` resolves.
    ///
    /// Shutdown also cancels a backfill still in progress; heights already
    /// stored stay stored. Backfill and tick failures are logged and never end
    /// the loop.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        self.set_state(SyncState::Starting);

        let backfilled = tokio::select! {
            _ = &mut shutdown => None,
            result = self.backfill() => Some(result),
        };
        match backfilled {
            None => {
                info!("shutdown during backfill");
                self.set_state(SyncState::Stopped);
                return;
            }
            Some(Err(e)) => {
                warn!(error = %e, "backfill aborted");
                if let Err(e) = self.init_cursor().await {
                    warn!(error = %e, "could not read highest stored block");
                }
            }
            Some(Ok(_)) => {}
        }

        self.set_state(SyncState::Polling);
        let period = self.config.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "polling tick failed");
                    }
                }
            }
        }
        self.set_state(SyncState::Stopped);
    }
}
