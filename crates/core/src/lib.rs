//! The core of argus: turns a run configuration into contracts and routes them to
//! the analysis crates.
//!
//! Contracts are acquired from raw bytecode, a deployed address, or solidity source
//! files (see [`acquire`]). Source files get placeholder addresses from
//! [`contract::indexed_address`] and feed the persistent signature catalog along
//! the way. [`dispatch::run`] then performs exactly one command.

pub mod acquire;
pub mod contract;
pub mod dispatch;
pub mod interfaces;

// Re-export the analysis crates
pub use argus_cfg;
pub use argus_db;
pub use argus_detectors;
pub use argus_disassembler;
pub use argus_vm;

pub use acquire::acquire;
pub use contract::{indexed_address, Contract};
pub use dispatch::{run, Context, USAGE};
pub use interfaces::{
    Command, ConnectorConfig, Network, RunConfiguration, RunConfigurationBuilder, Source,
};
