//! A persistent database of contracts seen on chain, stored as a bincode file in
//! the data directory. It is filled by [`sync`] and queried with [`search`]
//! expressions such as `code#PUSH1 0x50,POP# and not func#transfer(address,uint256)#`.

pub mod error;
mod search;
mod sync;

use std::{collections::BTreeMap, path::Path};

use alloy::primitives::{Address, U256};
use argus_common::utils::io::file::write_file_atomic;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::Error;
pub use search::{search, Expression, Match};
pub use sync::{sync, SyncReport, SYNC_BLOCKS};

/// A contract recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContract {
    /// Runtime bytecode.
    pub code: Vec<u8>,
    /// Balance in wei when the contract was recorded.
    pub balance: U256,
}

/// The contract database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDatabase {
    /// Highest block that has been synced.
    pub last_block: Option<u64>,
    /// Contracts by address.
    pub contracts: BTreeMap<Address, StoredContract>,
}

impl ContractDatabase {
    /// Read the database at `path`. A missing file is an empty database.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no contract database at '{}', starting empty", path.display());
            return Ok(Self::default());
        }

        let bytes = std::fs::read(path)?;
        let database: Self = bincode::deserialize(&bytes)?;
        debug!("loaded {} contracts from '{}'", database.contracts.len(), path.display());
        Ok(database)
    }

    /// Replace the database at `path` with this one.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let encoded = bincode::serialize(self)?;
        write_file_atomic(path.as_ref(), &encoded)
            .map_err(|e| Error::Generic(format!("failed to write contract database: {e}")))?;
        debug!("saved {} contracts to '{}'", self.contracts.len(), path.as_ref().display());
        Ok(())
    }

    /// Record a contract, replacing any earlier entry.
    pub fn insert(&mut self, address: Address, code: Vec<u8>, balance: U256) {
        self.contracts.insert(address, StoredContract { code, balance });
    }

    /// Number of contracts.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
