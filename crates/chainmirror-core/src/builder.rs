//! Fluent builder for [`SyncConfig`].
//!
//! # Example
//!
//! ```rust
//! use chainmirror_core::builder::SyncConfigBuilder;
//!
//! let config = SyncConfigBuilder::new()
//!     .poll_interval_ms(30_000)
//!     .batch_size(500)
//!     .backfill_window(200)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.batch_size, 500);
//! ```

use crate::config::SyncConfig;
use crate::error::MirrorError;

/// Fluent builder for `SyncConfig`.
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    /// Set the steady-state polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the number of heights fetched concurrently per backfill batch.
    pub fn batch_size(mut self, size: u64) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set how many heights below the stored highest block a restart backfill covers.
    pub fn backfill_window(mut self, window: u64) -> Self {
        self.config.backfill_window = window;
        self
    }

    /// Set the block budget of the time-range fallback walk.
    pub fn max_scan(mut self, n: u32) -> Self {
        self.config.max_scan = n;
        self
    }

    /// Set the first height mirrored into an empty store.
    pub fn start_height(mut self, height: u64) -> Self {
        self.config.start_height = height;
        self
    }

    /// Validate and return the `SyncConfig`.
    pub fn build(self) -> Result<SyncConfig, MirrorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
