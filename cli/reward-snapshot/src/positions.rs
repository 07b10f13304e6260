//! Position index for concentrated-liquidity pools.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::common::hex_encode;
use crate::error::ChainError;
use crate::types::{Address, U256};

/// One liquidity position in a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub owner: Address,
    pub liquidity: U256,
}

#[async_trait]
pub trait PositionIndex: Send + Sync {
    /// Open positions of `pool`.
    async fn positions(&self, pool: Address) -> Result<Vec<Position>, ChainError>;
}

/// Fixed positions, keyed by pool.
#[derive(Debug, Clone, Default)]
pub struct StaticPositionIndex {
    pools: HashMap<Address, Vec<Position>>,
}

impl StaticPositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pool: Address, owner: Address, liquidity: u64) -> &mut Self {
        self.pools.entry(pool).or_default().push(Position {
            owner,
            liquidity: U256::from(liquidity),
        });
        self
    }
}

#[async_trait]
impl PositionIndex for StaticPositionIndex {
    async fn positions(&self, pool: Address) -> Result<Vec<Position>, ChainError> {
        Ok(self.pools.get(&pool).cloned().unwrap_or_default())
    }
}

/// Maximum positions requested per pool.
const POSITIONS_PAGE: usize = 1000;

const POSITIONS_QUERY: &str = "query Positions($pool: String!, $first: Int!) { \
    positions(first: $first, where: { pool: $pool, liquidity_gt: \"0\" }) { owner liquidity } }";

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PositionsData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct PositionsData {
    positions: Vec<RawPosition>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    owner: String,
    liquidity: String,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

/// Subgraph-backed index (Uniswap V3 schema).
pub struct SubgraphPositionIndex {
    client: Client,
    url: String,
}

impl SubgraphPositionIndex {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

fn parse_positions(response: GraphResponse) -> Result<Vec<Position>, ChainError> {
    if let Some(error) = response.errors.first() {
        return Err(ChainError::Api(format!("subgraph: {}", error.message)));
    }
    let data = response
        .data
        .ok_or_else(|| ChainError::Decode("subgraph: response has no data".to_string()))?;

    data.positions
        .into_iter()
        .map(|raw| {
            let owner: Address = raw
                .owner
                .parse()
                .map_err(|e| ChainError::Decode(format!("subgraph owner: {e}")))?;
            let liquidity = U256::from_str_radix(&raw.liquidity, 10)
                .map_err(|e| ChainError::Decode(format!("subgraph liquidity: {e}")))?;
            Ok(Position { owner, liquidity })
        })
        .collect()
}

#[async_trait]
impl PositionIndex for SubgraphPositionIndex {
    async fn positions(&self, pool: Address) -> Result<Vec<Position>, ChainError> {
        let body = json!({
            "query": POSITIONS_QUERY,
            "variables": { "pool": hex_encode(pool.as_slice()), "first": POSITIONS_PAGE },
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        parse_positions(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positions() {
        let response: GraphResponse = serde_json::from_str(
            r#"{"data":{"positions":[
                {"owner":"0x0101010101010101010101010101010101010101","liquidity":"700"},
                {"owner":"0x0202020202020202020202020202020202020202","liquidity":"300"}
            ]}}"#,
        )
        .unwrap();
        let positions = parse_positions(response).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].owner, Address::repeat_byte(1));
        assert_eq!(positions[1].liquidity, U256::from(300u64));
    }

    #[test]
    fn test_parse_positions_graph_error() {
        let response: GraphResponse =
            serde_json::from_str(r#"{"errors":[{"message":"indexing error"}]}"#).unwrap();
        let err = parse_positions(response).unwrap_err();
        assert!(err.to_string().contains("indexing error"));
    }

    #[test]
    fn test_parse_positions_rejects_bad_liquidity() {
        let response: GraphResponse = serde_json::from_str(
            r#"{"data":{"positions":[
                {"owner":"0x0101010101010101010101010101010101010101","liquidity":"0x10"}
            ]}}"#,
        )
        .unwrap();
        assert!(matches!(parse_positions(response), Err(ChainError::Decode(_))));
    }

    #[tokio::test]
    async fn test_static_index() {
        let pool = Address::repeat_byte(9);
        let mut index = StaticPositionIndex::new();
        index.insert(pool, Address::repeat_byte(1), 10);
        assert_eq!(index.positions(pool).await.unwrap().len(), 1);
        assert!(index.positions(Address::repeat_byte(8)).await.unwrap().is_empty());
    }
}
