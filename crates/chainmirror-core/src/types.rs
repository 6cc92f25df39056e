//! Shared types for the mirroring pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Block ────────────────────────────────────────────────────────────────────

/// A block as mirrored from the remote source.
///
/// Field names follow the upstream GraphQL shape (`camelCase`) so the same
/// type serves the wire, the store and the read API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block hash, primary key.
    pub hash: String,
    /// Position in the canonical chain.
    pub height: u64,
    /// Block time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Weak reference to the preceding block; never followed by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    /// Opaque payload, stored and returned verbatim.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block time as a UTC datetime, if the timestamp is in range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Number of transactions in the block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Returns `true` if `timestamp` lies within `[start, end]`.
    pub fn within(&self, start: i64, end: i64) -> bool {
        self.timestamp >= start && self.timestamp <= end
    }
}

/// `{hash, height}` of the preceding block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub hash: String,
    pub height: u64,
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// A transaction record carried inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_stage: Option<String>,
    /// Hex-encoded raw transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_tree_root: Option<String>,
    /// Contract deploy/call/update actions, kept as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contract_actions: Vec<serde_json::Value>,
}

// ─── BlockKey ─────────────────────────────────────────────────────────────────

/// Identifier a block can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKey {
    Height(u64),
    Hash(String),
}

impl From<u64> for BlockKey {
    fn from(height: u64) -> Self {
        Self::Height(height)
    }
}

impl From<&str> for BlockKey {
    fn from(hash: &str) -> Self {
        Self::Hash(hash.to_string())
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Height(h) => write!(f, "height {h}"),
            Self::Hash(hash) => write!(f, "hash {hash}"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
