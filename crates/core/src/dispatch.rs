//! Routes a [`RunConfiguration`] to the subsystem implementing its command.

use std::{fmt, io::Write, path::Path, time::Instant};

use argus_cfg::{as_dot, render_html};
use argus_common::{
    ether::{
        compiler::Compiler,
        provider::{BlockTag, ChainSource, NodeConnector},
        signatures::{selector, SignatureCatalog},
    },
    utils::{
        io::file::write_file,
        strings::{decode_hex, encode_hex, parse_u256},
    },
    Error,
};
use argus_config::DataDir;
use argus_db::{search, sync, ContractDatabase, SYNC_BLOCKS};
use argus_detectors::{all_detectors, fire_lasers};
use argus_disassembler::{disassemble, xrefs};
use argus_vm::ext::{
    exec::{ConnectorLoader, StateSpace, StateSpaceBuilder},
    trace::trace,
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    acquire::{acquire, validate_address},
    contract::Contract,
    interfaces::{Command, RunConfiguration, Source},
};

/// Printed for [`Command::Help`].
pub const USAGE: &str = "\
usage: argus [FILES]... <COMMAND> [INPUT] [OPTIONS]

commands:
  -d, --disassemble          print the disassembly of the contract
  -t, --trace                execute the contract and print every step (call data with --data)
      --xrefs                print the addresses the contract references
  -g, --graph <PATH>         render the state space as an HTML graph
  -x, --fire-lasers          detect vulnerabilities
      --storage <INDEX>      read a storage slot of the contract at --address
  -s, --search <EXPR>        search the contract database, e.g. code#PUSH1 0x50,POP#
      --hash <SIGNATURE>     print the selector of a function signature
      --init-db              fill the contract database from recent blocks

input:
  -c, --code <HEX>           runtime bytecode
  -a, --address <ADDRESS>    a deployed contract
  FILES                      solidity source files, at most 16
  -l, --dynld                load called contracts from the node during analysis

node:
  --rpc <HOST:PORT>, --rpc-tls, --ipc <PATH>, --network <mainnet|sepolia|holesky|local>

run `argus --help` for every option.
";

/// What a run has access to besides its configuration.
pub struct Context<'a> {
    /// Holds the signature catalog and the contract database.
    pub data_dir: DataDir,
    /// Compiles source files.
    pub compiler: &'a dyn Compiler,
    /// The node, when the run needs one.
    pub connector: Option<&'a dyn ChainSource>,
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("data_dir", &self.data_dir)
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

fn require_connector<'a>(
    connector: Option<&'a dyn ChainSource>,
) -> Result<&'a dyn ChainSource, Error> {
    connector.ok_or_else(|| {
        Error::Configuration(
            "this command requires a node connection (--rpc, --ipc or --network)".to_string(),
        )
    })
}

/// The contracts of a run and the catalog used to label them.
struct Loaded<'a> {
    contracts: Vec<Contract>,
    catalog: SignatureCatalog,
    connector: Option<&'a dyn ChainSource>,
}

impl Loaded<'_> {
    /// Commands that look at a single contract use the first one.
    fn first(&self) -> &Contract {
        &self.contracts[0]
    }
}

/// Perform the run described by `config`, writing its output to `out`.
pub async fn run<W: Write>(
    config: &RunConfiguration,
    context: &Context<'_>,
    out: &mut W,
) -> Result<(), Error> {
    config.validate()?;

    match &config.command {
        Command::Help => write!(out, "{USAGE}")?,
        Command::Hash { signature } => writeln!(out, "{}", selector(signature))?,
        Command::Search { expression } => search_database(expression, context, out)?,
        Command::InitDb { sync_all } => init_database(*sync_all, context, out).await?,
        Command::Storage { index } => read_storage(config, index, context, out).await?,
        Command::Disassemble => {
            let loaded = load(config, context).await?;
            writeln!(out, "{}", disassemble(&loaded.first().bytecode, Some(&loaded.catalog)))?;
        }
        Command::Trace { data } => {
            let calldata = match data {
                Some(data) => {
                    decode_hex(data).map_err(|e| Error::InvalidCallData(e.to_string()))?
                }
                None => Vec::new(),
            };
            let loaded = load(config, context).await?;
            let contract = loaded.first();
            let result = trace(&contract.bytecode, &calldata, contract.address);
            debug!("trace ended with {}", result.exit);
            write!(out, "{result}")?;
        }
        Command::Xrefs => {
            let loaded = load(config, context).await?;
            for address in xrefs(&loaded.first().bytecode) {
                writeln!(out, "{address:#x}")?;
            }
        }
        Command::Graph { path, enable_physics } => {
            let loaded = load(config, context).await?;
            let space = explore(config, &loaded).await?;
            trace!("control flow graph:\n{}", as_dot(&space, Some(&loaded.catalog), true));
            write_graph(path, &render_html(&space, Some(&loaded.catalog), *enable_physics));
        }
        Command::FireLasers => {
            let loaded = load(config, context).await?;
            let space = explore(config, &loaded).await?;
            let report = fire_lasers(&space, &all_detectors());
            write!(out, "{}", report.render(Some(&loaded.catalog)))?;
        }
    }

    Ok(())
}

fn search_database<W: Write>(
    expression: &str,
    context: &Context<'_>,
    out: &mut W,
) -> Result<(), Error> {
    let database = ContractDatabase::load(context.data_dir.contracts_file())?;
    if database.is_empty() {
        warn!("the contract database is empty, run --init-db first");
    }

    let matches = search(&database, expression)?;
    for found in &matches {
        writeln!(out, "{found}")?;
    }
    info!("{} of {} contracts matched", matches.len(), database.len());
    Ok(())
}

async fn init_database<W: Write>(
    sync_all: bool,
    context: &Context<'_>,
    out: &mut W,
) -> Result<(), Error> {
    let source = require_connector(context.connector)?;
    let path = context.data_dir.contracts_file();

    let mut database = ContractDatabase::load(&path)?;
    let report = sync(source, &mut database, SYNC_BLOCKS, sync_all).await?;
    database.save(&path)?;

    writeln!(
        out,
        "synced {} blocks, added {} contracts ({} total)",
        report.blocks,
        report.added,
        database.len()
    )?;
    Ok(())
}

async fn read_storage<W: Write>(
    config: &RunConfiguration,
    index: &str,
    context: &Context<'_>,
    out: &mut W,
) -> Result<(), Error> {
    let index = parse_u256(index).ok_or_else(|| Error::InvalidIndex(index.to_string()))?;
    let Some(Source::Address(address)) = &config.source else {
        return Err(Error::MissingAddress);
    };
    let address = validate_address(address)?;

    let value = require_connector(context.connector)?
        .get_storage_at(address, index, BlockTag::Latest)
        .await?;
    writeln!(out, "0x{}", encode_hex(&value.to_be_bytes::<32>()))?;
    Ok(())
}

/// Load the catalog, connect when needed, and acquire the contracts.
async fn load<'a>(config: &RunConfiguration, context: &Context<'a>) -> Result<Loaded<'a>, Error> {
    let Some(source) = &config.source else {
        return Err(Error::Configuration("no input given".to_string()));
    };

    let catalog_path = context.data_dir.signatures_file();
    let mut catalog = SignatureCatalog::load(&catalog_path)?;
    debug!("loaded {} signatures from '{}'", catalog.len(), catalog_path.display());

    let connector = if config.requires_connector() {
        Some(require_connector(context.connector)?)
    } else {
        None
    };
    let contracts = acquire(
        source,
        &mut catalog,
        connector.map(|c| c as &dyn NodeConnector),
        context.compiler,
        &catalog_path,
    )
    .await?;
    if contracts.is_empty() {
        return Err(Error::Configuration("no contracts were loaded".to_string()));
    }

    Ok(Loaded { contracts, catalog, connector })
}

async fn explore(config: &RunConfiguration, loaded: &Loaded<'_>) -> Result<StateSpace, Error> {
    let start_time = Instant::now();
    let codes = loaded.contracts.iter().map(Contract::code).collect::<Vec<_>>();

    let loader = match loaded.connector {
        Some(connector) if config.dynamic_loading => Some(ConnectorLoader::new(connector)),
        _ => None,
    };
    let mut builder = StateSpaceBuilder::new().max_depth(config.max_depth);
    if let Some(loader) = &loader {
        builder = builder.loader(loader);
    }

    let space = builder.build(&codes).await?;
    info!(
        "explored {} blocks across {} contract(s) in {:?}",
        space.graph.node_count(),
        space.contracts.len(),
        start_time.elapsed()
    );
    Ok(space)
}

/// A graph that cannot be written is reported, but the run still succeeds.
fn write_graph(path: &Path, html: &str) {
    match write_file(path, html) {
        Ok(()) => info!("graph written to '{}'", path.display()),
        Err(e) => {
            let e = Error::Output { path: path.display().to_string(), reason: e.to_string() };
            error!("{}", e);
        }
    }
}
