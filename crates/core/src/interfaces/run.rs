//! The resolved run configuration: which command to execute, on which input, and
//! how to reach the node.

use std::path::PathBuf;

use argus_common::{
    utils::strings::{decode_hex, parse_u256},
    Error,
};
use argus_vm::ext::exec::DEFAULT_MAX_DEPTH;
use derive_builder::Builder;

use crate::{acquire::validate_address, interfaces::ConnectorConfig};

/// The operation a run performs. Exactly one is selected per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the disassembly of the first contract.
    Disassemble,
    /// Execute the first contract concretely and print every step.
    Trace {
        /// Call data, as hex.
        data: Option<String>,
    },
    /// Print the addresses referenced by the first contract.
    Xrefs,
    /// Render the state space as an HTML graph.
    Graph {
        /// Destination of the HTML file.
        path: PathBuf,
        /// Use a force-directed layout.
        enable_physics: bool,
    },
    /// Run the vulnerability detectors.
    FireLasers,
    /// Read one storage slot of an on-chain contract.
    Storage {
        /// Slot index, decimal or `0x` hex.
        index: String,
    },
    /// Search the contract database.
    Search {
        /// The search expression.
        expression: String,
    },
    /// Print the selector of a function signature.
    Hash {
        /// e.g. `transfer(address,uint256)`
        signature: String,
    },
    /// Fill the contract database from recent blocks.
    InitDb {
        /// Keep contracts without a balance.
        sync_all: bool,
    },
    /// Print usage.
    Help,
}

/// Where the contracts of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Hex encoded runtime bytecode.
    Bytecode(String),
    /// The address of a deployed contract.
    Address(String),
    /// Solidity source files, in command-line order.
    Files(Vec<PathBuf>),
}

/// Everything a run needs to know, resolved once from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct RunConfiguration {
    /// The operation to perform.
    pub command: Command,
    /// The contracts to operate on, if any were given.
    pub source: Option<Source>,
    /// How to reach a node.
    pub connector: ConnectorConfig,
    /// Bound on data-dependent branches per path, and on dynamic loading depth.
    pub max_depth: usize,
    /// Fetch the code of called contracts from the node during exploration.
    pub dynamic_loading: bool,
}

impl RunConfigurationBuilder {
    /// A builder for a [`Command::Help`] run with default tuning.
    pub fn new() -> Self {
        Self {
            command: Some(Command::Help),
            source: Some(None),
            connector: Some(ConnectorConfig::default()),
            max_depth: Some(DEFAULT_MAX_DEPTH),
            dynamic_loading: Some(false),
        }
    }
}

impl RunConfiguration {
    /// Whether the command operates on the contracts named by `source`.
    pub fn requires_contracts(&self) -> bool {
        match self.command {
            Command::Disassemble |
            Command::Trace { .. } |
            Command::Xrefs |
            Command::Graph { .. } |
            Command::FireLasers => true,
            Command::Storage { .. } |
            Command::Search { .. } |
            Command::Hash { .. } |
            Command::InitDb { .. } |
            Command::Help => false,
        }
    }

    /// Whether the run talks to a node.
    pub fn requires_connector(&self) -> bool {
        match self.command {
            Command::Storage { .. } | Command::InitDb { .. } => true,
            Command::Search { .. } | Command::Hash { .. } | Command::Help => false,
            Command::Disassemble |
            Command::Trace { .. } |
            Command::Xrefs |
            Command::Graph { .. } |
            Command::FireLasers => {
                self.dynamic_loading || matches!(self.source, Some(Source::Address(_)))
            }
        }
    }

    /// Check user input that can be rejected without touching the disk or the
    /// network: storage index, call data, address syntax, and whether a source
    /// was given at all.
    pub fn validate(&self) -> Result<(), Error> {
        match &self.command {
            Command::Storage { index } => {
                parse_u256(index).ok_or_else(|| Error::InvalidIndex(index.clone()))?;
                let Some(Source::Address(address)) = &self.source else {
                    return Err(Error::MissingAddress);
                };
                validate_address(address)?;
                return Ok(());
            }
            Command::Trace { data: Some(data) } => {
                decode_hex(data).map_err(|e| Error::InvalidCallData(e.to_string()))?;
            }
            Command::Trace { data: None } |
            Command::Disassemble |
            Command::Xrefs |
            Command::Graph { .. } |
            Command::FireLasers |
            Command::Search { .. } |
            Command::Hash { .. } |
            Command::InitDb { .. } |
            Command::Help => {}
        }

        if !self.requires_contracts() {
            return Ok(());
        }

        match &self.source {
            Some(Source::Address(address)) => validate_address(address).map(|_| ()),
            Some(Source::Bytecode(_)) | Some(Source::Files(_)) => Ok(()),
            None => Err(Error::Configuration(
                "no input given: provide bytecode with -c, an address with -a, or solidity files"
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: Command, source: Option<Source>) -> RunConfiguration {
        RunConfigurationBuilder::new()
            .command(command)
            .source(source)
            .build()
            .expect("all fields have defaults")
    }

    #[test]
    fn test_builder_defaults() {
        let config = RunConfigurationBuilder::new().build().expect("all fields have defaults");
        assert_eq!(config.command, Command::Help);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.dynamic_loading);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_index_checked_before_address() {
        let result = config(Command::Storage { index: "abc".to_string() }, None).validate();
        assert!(matches!(result, Err(Error::InvalidIndex(_))));

        let result = config(Command::Storage { index: "0x10".to_string() }, None).validate();
        assert!(matches!(result, Err(Error::MissingAddress)));

        let result = config(
            Command::Storage { index: "1".to_string() },
            Some(Source::Address("0x12".to_string())),
        )
        .validate();
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_trace_data_must_be_hex() {
        let source = Some(Source::Bytecode("0x00".to_string()));
        let result = config(Command::Trace { data: Some("0xzz".to_string()) }, source.clone());
        assert!(matches!(result.validate(), Err(Error::InvalidCallData(_))));

        let result = config(Command::Trace { data: Some("0xa9059cbb".to_string()) }, source);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_missing_source() {
        let result = config(Command::Disassemble, None).validate();
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(config(Command::Hash { signature: "f()".to_string() }, None).validate().is_ok());
    }

    #[test]
    fn test_requires_connector() {
        let address = Some(Source::Address(format!("0x{}", "1".repeat(40))));
        let bytecode = Some(Source::Bytecode("0x00".to_string()));

        assert!(config(Command::Disassemble, address).requires_connector());
        assert!(!config(Command::Disassemble, bytecode.clone()).requires_connector());
        assert!(config(Command::InitDb { sync_all: false }, None).requires_connector());
        assert!(!config(Command::Help, None).requires_connector());

        let mut dynld = config(Command::FireLasers, bytecode);
        dynld.dynamic_loading = true;
        assert!(dynld.requires_connector());
    }
}
