use alloy::primitives::{address, Address, U256};

/// `msg.sender` and `tx.origin` used when exploring: an externally owned account
/// unrelated to any contract under analysis.
pub const DEFAULT_CALLER: Address = address!("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef");

/// `block.coinbase`, "argus" followed by "coinbase" in ascii.
pub const COINBASE_ADDRESS: Address = address!("617267757300000000000000636f696e62617365");

/// Result of a successful CREATE, "argus" followed by "create" in ascii.
pub const CREATE_ADDRESS: Address = address!("6172677573000000000000000000637265617465");

/// `block.timestamp` seen by the VM.
pub const DEFAULT_TIMESTAMP: u64 = 1_700_000_000;

/// `block.number` seen by the VM.
pub const DEFAULT_BLOCK_NUMBER: u64 = 18_000_000;

/// `block.chainid` seen by the VM.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Gas reported by GAS and the gas limit of the block.
pub const DEFAULT_GAS: U256 = U256::from_limbs([30_000_000, 0, 0, 0]);
