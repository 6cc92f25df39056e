//! GraphQL documents sent to the indexer.
//!
//! Every query selects the full block shape so a fetched block can be
//! persisted as-is, whichever lookup produced it.

/// Field selection shared by all block queries.
macro_rules! block_fields {
    () => {
        r#"
        hash
        height
        protocolVersion
        timestamp
        author
        parent {
          hash
          height
        }
        transactions {
          hash
          identifiers
          applyStage
          raw
          merkleTreeRoot
          contractActions {
            __typename
            ... on ContractDeploy {
              address
              state
              chainState
            }
            ... on ContractCall {
              address
              state
              chainState
              entryPoint
              deploy { address }
            }
            ... on ContractUpdate {
              address
              state
              chainState
            }
          }
        }
        "#
    };
}

/// Highest block known to the indexer.
pub const LATEST_BLOCK: &str = concat!(
    "query GetLatestBlock {\n  block {",
    block_fields!(),
    "}\n}"
);

/// Block at `$height`.
pub const BLOCK_BY_HEIGHT: &str = concat!(
    "query GetBlockByHeight($height: Int!) {\n  block(offset: { height: $height }) {",
    block_fields!(),
    "}\n}"
);

/// Block with `$hash`.
pub const BLOCK_BY_HASH: &str = concat!(
    "query GetBlockByHash($hash: String!) {\n  block(offset: { hash: $hash }) {",
    block_fields!(),
    "}\n}"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_share_full_selection() {
        for q in [LATEST_BLOCK, BLOCK_BY_HEIGHT, BLOCK_BY_HASH] {
            assert!(q.contains("protocolVersion"));
            assert!(q.contains("parent {"));
            assert!(q.contains("... on ContractCall"));
            assert_eq!(q.matches('{').count(), q.matches('}').count());
        }
    }

    #[test]
    fn point_lookups_take_offsets() {
        assert!(BLOCK_BY_HEIGHT.contains("offset: { height: $height }"));
        assert!(BLOCK_BY_HASH.contains("offset: { hash: $hash }"));
        assert!(!LATEST_BLOCK.contains("offset"));
    }
}
