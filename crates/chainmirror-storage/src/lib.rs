//! chainmirror-storage: durable block store backends for ChainMirror.
//!
//! Backends:
//! - [`MemoryBlockStore`]: in-memory (dev/testing, no persistence), from `chainmirror-core`
//! - `sqlite`: SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres`: PostgreSQL via `sqlx` (pooled, production)
//!
//! Every backend creates the `blocks` table on connect and inserts with
//! `ON CONFLICT (hash) DO NOTHING`, so concurrent duplicate writes are no-ops.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use chainmirror_core::store::{BlockStore, MemoryBlockStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBlockStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresBlockStore, PostgresOptions};
