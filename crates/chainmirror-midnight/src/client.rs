//! HTTP GraphQL client for the Midnight indexer, backed by `reqwest`.
//!
//! Each [`BlockSource`] call issues exactly one `POST {query, variables}`.
//! Retries and caching are left to callers.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use chainmirror_core::error::MirrorError;
use chainmirror_core::source::BlockSource;
use chainmirror_core::types::Block;

use crate::queries;

/// Public testnet-02 indexer endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://indexer.testnet-02.midnight.network/api/v1/graphql";

/// Configuration for [`MidnightClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<BlockData>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct BlockData {
    block: Option<Block>,
}

/// Block source talking to a Midnight indexer GraphQL endpoint.
#[derive(Clone)]
pub struct MidnightClient {
    endpoint: String,
    http: reqwest::Client,
}

impl MidnightClient {
    /// Create a client for `endpoint`.
    pub fn new(endpoint: impl Into<String>, config: ClientConfig) -> Result<Self, MirrorError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MirrorError::Config(format!("http client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    /// Create with default configuration.
    pub fn default_for(endpoint: impl Into<String>) -> Result<Self, MirrorError> {
        Self::new(endpoint, ClientConfig::default())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query_block(&self, query: &str, variables: Value) -> Result<Option<Block>, MirrorError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| MirrorError::Remote(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(MirrorError::Remote(format!("HTTP {status}: {body}")));
        }

        let envelope: Envelope = resp
            .json()
            .await
            .map_err(|e| MirrorError::Remote(format!("malformed response: {e}")))?;

        if let Some(errors) = envelope.errors.filter(|errs| !errs.is_empty()) {
            return Err(MirrorError::Remote(Value::Array(errors).to_string()));
        }

        Ok(envelope.data.and_then(|d| d.block))
    }
}

#[async_trait]
impl BlockSource for MidnightClient {
    async fn fetch_tip(&self) -> Result<Block, MirrorError> {
        let block = self
            .query_block(queries::LATEST_BLOCK, json!({}))
            .await?
            .ok_or_else(|| MirrorError::Remote("indexer returned no latest block".into()))?;
        debug!(height = block.height, "fetched tip");
        Ok(block)
    }

    async fn fetch_by_height(&self, height: u64) -> Result<Option<Block>, MirrorError> {
        self.query_block(queries::BLOCK_BY_HEIGHT, json!({ "height": height }))
            .await
    }

    async fn fetch_by_hash(&self, hash: &str) -> Result<Option<Block>, MirrorError> {
        self.query_block(queries::BLOCK_BY_HASH, json!({ "hash": hash }))
            .await
    }
}
