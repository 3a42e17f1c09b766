use std::fmt::Debug;

use alloy::primitives::Address;
use argus_common::ether::provider::NodeConnector;
use async_trait::async_trait;
use eyre::Result;

/// Resolves the code of contracts reached through external calls during exploration.
#[async_trait]
pub trait DynLoader: Send + Sync + Debug {
    /// The runtime code at `address`, or `None` if there is none.
    async fn load(&self, address: Address) -> Result<Option<Vec<u8>>>;
}

/// A [`DynLoader`] that reads code from a node.
#[derive(Debug)]
pub struct ConnectorLoader<'a> {
    connector: &'a dyn NodeConnector,
}

impl<'a> ConnectorLoader<'a> {
    /// Load code through `connector`.
    pub fn new(connector: &'a dyn NodeConnector) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl DynLoader for ConnectorLoader<'_> {
    async fn load(&self, address: Address) -> Result<Option<Vec<u8>>> {
        let code = self.connector.get_code(address).await?;
        Ok((!code.is_empty()).then(|| code.to_vec()))
    }
}
