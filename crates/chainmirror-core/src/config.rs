//! Sync configuration and engine state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// Largest `n` accepted by recent-block reads.
pub const MAX_RECENT: usize = 100;

/// Configuration shared by the sync engine and the cache-aside reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Polling interval in steady state (milliseconds).
    pub poll_interval_ms: u64,
    /// How many heights are fetched concurrently per backfill batch.
    pub batch_size: u64,
    /// How far below the stored highest height a restart backfill begins.
    pub backfill_window: u64,
    /// Upper bound on blocks visited by the time-range fallback walk.
    pub max_scan: u32,
    /// First height to mirror when the store is empty.
    pub start_height: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            batch_size: 1000,
            backfill_window: 1000,
            max_scan: 100,
            start_height: 0,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the engine cannot make progress with.
    pub fn validate(&self) -> Result<(), MirrorError> {
        if self.batch_size == 0 {
            return Err(MirrorError::Config("batch_size must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(MirrorError::Config("poll_interval_ms must be at least 1".into()));
        }
        if self.max_scan == 0 {
            return Err(MirrorError::Config("max_scan must be at least 1".into()));
        }
        Ok(())
    }
}

/// Lifecycle of a [`SyncEngine`](crate::engine::SyncEngine).
///
/// `Starting -> Backfilling -> Polling`; `Stopped` is only reached through an
/// external shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Starting,
    Backfilling,
    Polling,
    Stopped,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Backfilling => write!(f, "backfilling"),
            Self::Polling => write!(f, "polling"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot published by the engine on every state or cursor change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Engine cursor; `None` until something has been mirrored.
    pub last_known_height: Option<u64>,
    /// Tip height seen on the most recent remote tip fetch.
    pub remote_tip: Option<u64>,
}

impl SyncStatus {
    /// Heights between the cursor and the last seen tip.
    pub fn lag(&self) -> Option<u64> {
        let tip = self.remote_tip?;
        Some(match self.last_known_height {
            Some(h) => tip.saturating_sub(h),
            None => tip + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SyncConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.max_scan, 100);
    }

    #[test]
    fn zero_batch_rejected() {
        let cfg = SyncConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(MirrorError::Config(_))));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: SyncConfig = serde_json::from_str(r#"{"batch_size": 50}"#).unwrap();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.backfill_window, 1000);
    }

    #[test]
    fn status_lag() {
        let status = SyncStatus {
            state: SyncState::Polling,
            last_known_height: Some(100),
            remote_tip: Some(103),
        };
        assert_eq!(status.lag(), Some(3));
        assert_eq!(SyncState::Backfilling.to_string(), "backfilling");
    }
}
