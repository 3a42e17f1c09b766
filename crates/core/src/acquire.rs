//! Turns a [`Source`] into the set of contracts a command runs against.

use std::{path::Path, time::Instant};

use alloy::primitives::{Address, Bytes};
use argus_common::{
    constants::{ADDRESS_REGEX, MAX_INDEXED_CONTRACTS},
    ether::{
        compiler::Compiler,
        provider::{BlockTag, NodeConnector},
        signatures::SignatureCatalog,
    },
    utils::{
        io::file::{expand_home, read_file},
        strings::decode_hex,
    },
    Error,
};
use tracing::{debug, info};

use crate::{
    contract::{indexed_address, Contract, MAIN_CONTRACT},
    interfaces::Source,
};

/// Parse `address` if it is `0x` followed by exactly 40 hex characters.
pub fn validate_address(address: &str) -> Result<Address, Error> {
    if !ADDRESS_REGEX.is_match(address).unwrap_or(false) {
        return Err(Error::InvalidAddress(address.to_string()));
    }
    address.parse::<Address>().map_err(|_| Error::InvalidAddress(address.to_string()))
}

/// Acquire the contracts named by `source`.
///
/// Source files have their signatures merged into `catalog` before they are
/// compiled, and the catalog is written to `catalog_path` once: after the last
/// file, or right after the first compilation failure so signatures from the
/// files seen so far are kept.
pub async fn acquire(
    source: &Source,
    catalog: &mut SignatureCatalog,
    connector: Option<&dyn NodeConnector>,
    compiler: &dyn Compiler,
    catalog_path: &Path,
) -> Result<Vec<Contract>, Error> {
    let start_time = Instant::now();
    let contracts = match source {
        Source::Bytecode(code) => vec![from_bytecode(code)?],
        Source::Address(address) => vec![from_address(address, connector).await?],
        Source::Files(files) => from_files(files, catalog, compiler, catalog_path)?,
    };

    debug!("acquired {} contract(s) in {:?}", contracts.len(), start_time.elapsed());
    Ok(contracts)
}

fn from_bytecode(code: &str) -> Result<Contract, Error> {
    let bytecode = decode_hex(code).map_err(|e| Error::InvalidBytecode(e.to_string()))?;
    if bytecode.is_empty() {
        return Err(Error::InvalidBytecode("no bytecode given".to_string()));
    }

    Ok(Contract {
        name: MAIN_CONTRACT.to_string(),
        bytecode: Bytes::from(bytecode),
        address: indexed_address(0)?,
    })
}

async fn from_address(
    address: &str,
    connector: Option<&dyn NodeConnector>,
) -> Result<Contract, Error> {
    let parsed = validate_address(address)?;
    let connector = connector.ok_or_else(|| {
        Error::Configuration(
            "loading a contract by address requires a node connection (--rpc, --ipc or --network)"
                .to_string(),
        )
    })?;

    info!("fetching code of {}", address);
    let bytecode = connector.get_code(parsed).await?;
    if bytecode.is_empty() {
        return Err(Error::EmptyCode(address.to_string()));
    }

    Ok(Contract { name: address.to_string(), bytecode, address: parsed })
}

fn from_files(
    files: &[std::path::PathBuf],
    catalog: &mut SignatureCatalog,
    compiler: &dyn Compiler,
    catalog_path: &Path,
) -> Result<Vec<Contract>, Error> {
    if files.len() > MAX_INDEXED_CONTRACTS {
        return Err(Error::TooManyContracts { count: files.len(), max: MAX_INDEXED_CONTRACTS });
    }

    let mut contracts = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let path = expand_home(&file.to_string_lossy());
        let source = read_file(&path).map_err(|e| {
            Error::Configuration(format!("failed to read '{}': {}", path.display(), e))
        })?;

        let report = catalog.merge_from_source(&source);
        debug!(
            "'{}': {} new signature(s), {} collision(s)",
            path.display(),
            report.added.len(),
            report.collisions.len()
        );

        let unit = match compiler.compile(&path) {
            Ok(unit) => unit,
            Err(e) => {
                catalog.save(catalog_path)?;
                return Err(e);
            }
        };
        if unit.bytecode.is_empty() {
            catalog.save(catalog_path)?;
            return Err(Error::Compilation {
                path: path.display().to_string(),
                diagnostic: format!("'{}' has no runtime code", unit.name),
            });
        }

        info!("compiled '{}' from '{}'", unit.name, path.display());
        contracts.push(Contract {
            name: unit.name,
            bytecode: Bytes::from(unit.bytecode),
            address: indexed_address(index)?,
        });
    }

    catalog.save(catalog_path)?;
    Ok(contracts)
}
