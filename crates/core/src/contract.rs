use alloy::primitives::{Address, Bytes};
use argus_common::{constants::MAX_INDEXED_CONTRACTS, Error};
use argus_vm::ext::exec::ContractCode;

/// Name given to a contract supplied as raw bytecode.
pub const MAIN_CONTRACT: &str = "MAIN";

/// A contract ready for analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    /// The address string given by the user, [`MAIN_CONTRACT`], or the compiled unit name.
    pub name: String,
    /// Runtime bytecode, never empty.
    pub bytecode: Bytes,
    /// The on-chain address, or an [`indexed_address`] for local contracts.
    pub address: Address,
}

impl Contract {
    /// The contract in the form the state-space explorer consumes.
    pub fn code(&self) -> ContractCode {
        ContractCode {
            name: self.name.clone(),
            address: self.address,
            code: self.bytecode.to_vec(),
        }
    }
}

/// The placeholder address of the `index`-th locally supplied contract: every byte
/// is `index * 0x11`, so the address reads as the hex digit `index` repeated forty
/// times.
///
/// ```
/// use argus_core::contract::indexed_address;
///
/// let address = indexed_address(10).expect("index is in range");
/// assert_eq!(format!("{address:#x}"), format!("0x{}", "a".repeat(40)));
/// assert!(indexed_address(16).is_err());
/// ```
pub fn indexed_address(index: usize) -> Result<Address, Error> {
    if index >= MAX_INDEXED_CONTRACTS {
        return Err(Error::TooManyContracts { count: index + 1, max: MAX_INDEXED_CONTRACTS });
    }

    Ok(Address::repeat_byte(index as u8 * 0x11))
}
