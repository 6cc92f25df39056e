//! SQLite block store.
//!
//! Persists mirrored blocks to a single SQLite file. Uses `sqlx` with WAL mode
//! for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use chainmirror_storage::sqlite::SqliteBlockStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteBlockStore::open("./blocks.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteBlockStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use chainmirror_core::error::MirrorError;
use chainmirror_core::store::BlockStore;
use chainmirror_core::types::{Block, ParentRef, Transaction};

const SELECT_BLOCK: &str = "SELECT hash, height, timestamp, protocol_version, author,
        parent_hash, parent_height, transactions
 FROM blocks";

/// SQLite-backed block store.
pub struct SqliteBlockStore {
    pool: SqlitePool,
}

impl SqliteBlockStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./blocks.db"`) or a SQLite URL
    /// (`"sqlite:./blocks.db"`). The file is created if missing.
    pub async fn open(path: &str) -> Result<Self, MirrorError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}")
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| MirrorError::Config(format!("invalid sqlite url {url}: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Backed by a single pooled connection, since every SQLite connection to
    /// `:memory:` sees its own database. All data is lost when the store is
    /// dropped.
    pub async fn in_memory() -> Result<Self, MirrorError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the `blocks` table and enable WAL mode.
    async fn init_schema(&self) -> Result<(), MirrorError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                hash             TEXT    PRIMARY KEY,
                height           INTEGER NOT NULL UNIQUE,
                timestamp        INTEGER NOT NULL,
                protocol_version INTEGER,
                author           TEXT,
                parent_hash      TEXT,
                parent_height    INTEGER,
                transactions     TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MirrorError::Storage(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blocks_timestamp ON blocks (timestamp);")
            .execute(&self.pool)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Number of stored blocks.
    pub async fn count(&self) -> Result<u64, MirrorError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

fn block_from_row(row: &SqliteRow) -> Result<Block, MirrorError> {
    let map = |e: sqlx::Error| MirrorError::Storage(e.to_string());

    let transactions: String = row.try_get("transactions").map_err(map)?;
    let transactions: Vec<Transaction> = serde_json::from_str(&transactions)
        .map_err(|e| MirrorError::Storage(format!("corrupt transactions column: {e}")))?;

    let parent_hash: Option<String> = row.try_get("parent_hash").map_err(map)?;
    let parent_height: Option<i64> = row.try_get("parent_height").map_err(map)?;

    Ok(Block {
        hash: row.try_get("hash").map_err(map)?,
        height: row.try_get::<i64, _>("height").map_err(map)? as u64,
        timestamp: row.try_get("timestamp").map_err(map)?,
        protocol_version: row
            .try_get::<Option<i64>, _>("protocol_version")
            .map_err(map)?
            .map(|v| v as u32),
        author: row.try_get("author").map_err(map)?,
        parent: match (parent_hash, parent_height) {
            (Some(hash), Some(height)) => Some(ParentRef {
                hash,
                height: height as u64,
            }),
            _ => None,
        },
        transactions,
    })
}

#[async_trait]
impl BlockStore for SqliteBlockStore {
    async fn upsert(&self, block: &Block) -> Result<(), MirrorError> {
        let transactions = serde_json::to_string(&block.transactions)
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO blocks
                (hash, height, timestamp, protocol_version, author, parent_hash, parent_height, transactions)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (hash) DO NOTHING",
        )
        .bind(&block.hash)
        .bind(block.height as i64)
        .bind(block.timestamp)
        .bind(block.protocol_version.map(i64::from))
        .bind(&block.author)
        .bind(block.parent.as_ref().map(|p| p.hash.as_str()))
        .bind(block.parent.as_ref().map(|p| p.height as i64))
        .bind(&transactions)
        .execute(&self.pool)
        .await
        .map_err(|e| MirrorError::Storage(e.to_string()))?;

        debug!(
            height = block.height,
            inserted = result.rows_affected() > 0,
            "block upserted"
        );
        Ok(())
    }

    async fn get_by_height(&self, height: u64) -> Result<Option<Block>, MirrorError> {
        let row = sqlx::query(&format!("{SELECT_BLOCK} WHERE height = ?"))
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        row.as_ref().map(block_from_row).transpose()
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError> {
        let row = sqlx::query(&format!("{SELECT_BLOCK} WHERE hash = ?"))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        row.as_ref().map(block_from_row).transpose()
    }

    async fn get_by_time_range(&self, start: i64, end: i64) -> Result<Vec<Block>, MirrorError> {
        let rows = sqlx::query(&format!(
            "{SELECT_BLOCK} WHERE timestamp >= ? AND timestamp <= ? ORDER BY timestamp ASC, height ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MirrorError::Storage(e.to_string()))?;

        rows.iter().map(block_from_row).collect()
    }

    async fn get_highest(&self) -> Result<Option<Block>, MirrorError> {
        let row = sqlx::query(&format!("{SELECT_BLOCK} ORDER BY height DESC LIMIT 1"))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MirrorError::Storage(e.to_string()))?;

        row.as_ref().map(block_from_row).transpose()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
