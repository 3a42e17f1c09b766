//! Node connectors: the narrow interface argus uses to read chain state, and the
//! alloy-backed implementation used against a real node.
use std::{fmt::Debug, future::Future, time::Duration};

use alloy::{
    eips::BlockId,
    network::Ethereum,
    primitives::{Address, Bytes, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::Error;

/// The block a state read is made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    /// The node's most recent block.
    #[default]
    Latest,
    /// A specific block height.
    Number(u64),
}

impl From<BlockTag> for BlockId {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => BlockId::latest(),
            BlockTag::Number(n) => BlockId::number(n),
        }
    }
}

/// Read access to contract code and storage. Every failure at the transport level
/// surfaces as [`Error::ConnectorUnavailable`]; implementations never retry.
#[async_trait]
pub trait NodeConnector: Send + Sync + Debug {
    /// The deployed code at `address`. An account without code yields empty bytes.
    async fn get_code(&self, address: Address) -> Result<Bytes, Error>;

    /// The storage word at `index` for `address`, as of `block`.
    async fn get_storage_at(
        &self,
        address: Address,
        index: U256,
        block: BlockTag,
    ) -> Result<U256, Error>;
}

/// Extra chain queries needed to populate the contract database.
#[async_trait]
pub trait ChainSource: NodeConnector {
    /// Height of the most recent block.
    async fn latest_block_number(&self) -> Result<u64, Error>;

    /// Addresses of contracts deployed by transactions in block `number`.
    async fn created_contracts(&self, number: u64) -> Result<Vec<Address>, Error>;

    /// Ether balance of `address` at the latest block.
    async fn get_balance(&self, address: Address) -> Result<U256, Error>;
}

/// [`MultiTransportProvider`] is a convenience wrapper around the different transport types
/// supported by the [`Provider`]: http(s), ws(s) and ipc, selected from the endpoint string.
#[derive(Clone, Debug)]
pub struct MultiTransportProvider {
    provider: RootProvider<Ethereum>,
    endpoint: String,
    timeout: Option<Duration>,
}

impl MultiTransportProvider {
    /// Connect to a provider using the given endpoint.
    pub async fn connect(endpoint: &str) -> Result<Self, Error> {
        if endpoint.is_empty() {
            return Err(Error::Configuration(
                "no node endpoint configured, use --rpc, --ipc or --network".to_string(),
            ));
        }

        debug!("connecting to node at '{}'", endpoint);
        let provider = ProviderBuilder::new()
            .connect(endpoint)
            .await
            .map_err(|e| Error::ConnectorUnavailable {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?
            .root()
            .clone();

        Ok(Self { provider, endpoint: endpoint.to_string(), timeout: None })
    }

    /// Bound every subsequent call by `timeout`. `None` leaves calls unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint this provider is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn guarded<T, E, F>(&self, call: F) -> Result<T, Error>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>, {
        let unavailable = |reason: String| Error::ConnectorUnavailable {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| unavailable(format!("no response within {limit:?}")))?,
            None => call.await,
        };

        result.map_err(|e| unavailable(e.to_string()))
    }
}

#[async_trait]
impl NodeConnector for MultiTransportProvider {
    async fn get_code(&self, address: Address) -> Result<Bytes, Error> {
        trace!("eth_getCode {}", address);
        self.guarded(async { self.provider.get_code_at(address).await }).await
    }

    async fn get_storage_at(
        &self,
        address: Address,
        index: U256,
        block: BlockTag,
    ) -> Result<U256, Error> {
        trace!("eth_getStorageAt {} {:#x} {:?}", address, index, block);
        self.guarded(async {
            self.provider.get_storage_at(address, index).block_id(block.into()).await
        })
        .await
    }
}

#[async_trait]
impl ChainSource for MultiTransportProvider {
    async fn latest_block_number(&self) -> Result<u64, Error> {
        self.guarded(async { self.provider.get_block_number().await }).await
    }

    async fn created_contracts(&self, number: u64) -> Result<Vec<Address>, Error> {
        let receipts = self
            .guarded(async { self.provider.get_block_receipts(BlockId::number(number)).await })
            .await?
            .unwrap_or_default();

        Ok(receipts.into_iter().filter_map(|receipt| receipt.contract_address).collect())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, Error> {
        self.guarded(async { self.provider.get_balance(address).await }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[tokio::test]
    async fn test_connect_rejects_empty_endpoint() {
        assert!(matches!(
            MultiTransportProvider::connect("").await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_get_code_against_live_node() {
        let Ok(rpc_url) = std::env::var("RPC_URL") else {
            println!("RPC_URL not set, skipping test");
            return;
        };

        let provider = MultiTransportProvider::connect(&rpc_url)
            .await
            .expect("failed to connect")
            .with_timeout(Some(Duration::from_secs(30)));
        let code = provider
            .get_code(address!("1f9840a85d5af5bf1d1762f925bdaddc4201f984"))
            .await
            .expect("failed to fetch code");
        assert!(!code.is_empty());
    }

    #[test]
    fn test_block_tag_conversion() {
        assert_eq!(BlockId::from(BlockTag::Latest), BlockId::latest());
        assert_eq!(BlockId::from(BlockTag::Number(7)), BlockId::number(7));
    }
}
