use std::{path::PathBuf, time::Duration};

use argus_core::{
    argus_vm::ext::exec::DEFAULT_MAX_DEPTH, Command, ConnectorConfig, Network, RunConfiguration,
    RunConfigurationBuilder, Source,
};
use clap::{Args, Parser};

use crate::{error::Error, log_args::LogArgs};

#[derive(Debug, Parser)]
#[clap(
    name = "argus",
    version,
    about = "Security analysis of EVM bytecode and solidity contracts",
    after_help = "Exactly one command may be given. Without one, usage is printed."
)]
pub(crate) struct Arguments {
    #[clap(flatten)]
    pub(crate) inputs: InputArgs,

    #[clap(flatten)]
    pub(crate) commands: CommandArgs,

    #[clap(flatten)]
    pub(crate) options: OptionArgs,

    #[clap(flatten)]
    pub(crate) connector: ConnectorArgs,

    #[clap(flatten)]
    pub(crate) logs: LogArgs,
}

/// The command to run. At most one may be given.
#[derive(Debug, Default, Args)]
#[group(id = "commands", multiple = false)]
#[clap(next_help_heading = "COMMANDS")]
pub(crate) struct CommandArgs {
    /// Print the disassembly of the contract.
    #[clap(long, short = 'd')]
    pub(crate) disassemble: bool,

    /// Render the explored state space as an HTML graph at PATH.
    #[clap(long, short = 'g', value_name = "PATH")]
    pub(crate) graph: Option<PathBuf>,

    /// Run the vulnerability detectors.
    #[clap(long = "fire-lasers", short = 'x')]
    pub(crate) fire_lasers: bool,

    /// Execute the contract and print every step. Call data is taken from --data.
    #[clap(long, short = 't')]
    pub(crate) trace: bool,

    /// Search the contract database, e.g. `code#PUSH1 0x50,POP# and not func#f()#`.
    #[clap(long, short = 's', value_name = "EXPRESSION")]
    pub(crate) search: Option<String>,

    /// Print the addresses referenced by the contract.
    #[clap(long)]
    pub(crate) xrefs: bool,

    /// Print the function selector of SIGNATURE.
    #[clap(long, value_name = "SIGNATURE")]
    pub(crate) hash: Option<String>,

    /// Read storage slot INDEX (decimal or 0x hex) of the contract at --address.
    #[clap(long, value_name = "INDEX")]
    pub(crate) storage: Option<String>,

    /// Fill the contract database from recent blocks.
    #[clap(long = "init-db")]
    pub(crate) init_db: bool,
}

/// Where the contracts come from. At most one may be given.
#[derive(Debug, Default, Args)]
#[group(id = "inputs", multiple = false)]
#[clap(next_help_heading = "INPUT")]
pub(crate) struct InputArgs {
    /// Solidity source files, at most 16.
    #[clap(value_name = "FILES")]
    pub(crate) files: Vec<PathBuf>,

    /// Runtime bytecode, as hex.
    #[clap(long, short = 'c', value_name = "HEX")]
    pub(crate) code: Option<String>,

    /// Address of a deployed contract.
    #[clap(long, short = 'a', value_name = "ADDRESS")]
    pub(crate) address: Option<String>,
}

#[derive(Debug, Args)]
#[clap(next_help_heading = "OPTIONS")]
pub(crate) struct OptionArgs {
    /// Call data for --trace, as hex.
    #[clap(long, value_name = "HEX")]
    pub(crate) data: Option<String>,

    /// Load the code of called contracts from the node during analysis.
    #[clap(long, short = 'l')]
    pub(crate) dynld: bool,

    /// With --init-db, also record contracts without a balance.
    #[clap(long = "sync-all")]
    pub(crate) sync_all: bool,

    /// Maximum number of data-dependent branches followed per path.
    #[clap(long = "max-depth", value_name = "N", default_value_t = DEFAULT_MAX_DEPTH)]
    pub(crate) max_depth: usize,

    /// Use a force-directed layout for --graph.
    #[clap(long = "enable-physics")]
    pub(crate) enable_physics: bool,
}

#[derive(Debug, Default, Args)]
#[clap(next_help_heading = "NODE")]
pub(crate) struct ConnectorArgs {
    /// Node to connect to, as HOST:PORT, a URL, or a MESC endpoint name.
    #[clap(long, value_name = "HOST:PORT")]
    pub(crate) rpc: Option<String>,

    /// Use https for --rpc HOST:PORT.
    #[clap(long = "rpc-tls")]
    pub(crate) rpc_tls: bool,

    /// Connect through an IPC socket.
    #[clap(long, value_name = "PATH")]
    pub(crate) ipc: Option<PathBuf>,

    /// Connect to a well-known network.
    #[clap(long, value_name = "PRESET")]
    pub(crate) network: Option<Network>,

    /// Give up on a node request after this many seconds.
    #[clap(long = "rpc-timeout", value_name = "SECS")]
    pub(crate) rpc_timeout: Option<u64>,
}

impl Arguments {
    /// The selected command, [`Command::Help`] if there is none.
    pub(crate) fn command(&self) -> Command {
        let commands = &self.commands;
        if commands.disassemble {
            Command::Disassemble
        } else if let Some(path) = &commands.graph {
            Command::Graph { path: path.clone(), enable_physics: self.options.enable_physics }
        } else if commands.fire_lasers {
            Command::FireLasers
        } else if commands.trace {
            Command::Trace { data: self.options.data.clone() }
        } else if let Some(expression) = &commands.search {
            Command::Search { expression: expression.clone() }
        } else if commands.xrefs {
            Command::Xrefs
        } else if let Some(signature) = &commands.hash {
            Command::Hash { signature: signature.clone() }
        } else if let Some(index) = &commands.storage {
            Command::Storage { index: index.clone() }
        } else if commands.init_db {
            Command::InitDb { sync_all: self.options.sync_all }
        } else {
            Command::Help
        }
    }

    /// The selected source, if any.
    pub(crate) fn source(&self) -> Option<Source> {
        let inputs = &self.inputs;
        if let Some(code) = &inputs.code {
            Some(Source::Bytecode(code.clone()))
        } else if let Some(address) = &inputs.address {
            Some(Source::Address(address.clone()))
        } else if !inputs.files.is_empty() {
            Some(Source::Files(inputs.files.clone()))
        } else {
            None
        }
    }

    /// Resolve the arguments into the configuration of this run.
    pub(crate) fn run_configuration(&self) -> Result<RunConfiguration, Error> {
        let connector = ConnectorConfig {
            ipc: self.connector.ipc.clone(),
            network: self.connector.network,
            rpc: self.connector.rpc.clone(),
            tls: self.connector.rpc_tls,
            timeout: self.connector.rpc_timeout.map(Duration::from_secs),
        };

        RunConfigurationBuilder::new()
            .command(self.command())
            .source(self.source())
            .connector(connector)
            .max_depth(self.options.max_depth)
            .dynamic_loading(self.options.dynld)
            .build()
            .map_err(|e| Error::Arguments(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Arguments {
        Arguments::try_parse_from(std::iter::once("argus").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn test_no_command_is_help() {
        let config = parse(&[]).run_configuration().expect("valid configuration");
        assert_eq!(config.command, Command::Help);
        assert_eq!(config.source, None);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_commands_are_exclusive() {
        let result = Arguments::try_parse_from(["argus", "-d", "-x", "-c", "0x00"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_inputs_are_exclusive() {
        let address = format!("0x{}", "1".repeat(40));
        let result = Arguments::try_parse_from(["argus", "-d", "-c", "0x00", "-a", &address]);
        assert!(result.is_err());

        let result = Arguments::try_parse_from(["argus", "-d", "Token.sol", "-c", "0x00"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_trace_with_data() {
        let config = parse(&["-t", "-c", "0x5f35", "--data", "0xff"])
            .run_configuration()
            .expect("valid configuration");
        assert_eq!(config.command, Command::Trace { data: Some("0xff".to_string()) });
        assert_eq!(config.source, Some(Source::Bytecode("0x5f35".to_string())));
    }

    #[test]
    fn test_graph_with_files() {
        let args = ["A.sol", "B.sol", "-g", "out.html", "--enable-physics", "--max-depth", "8"];
        let config = parse(&args).run_configuration().expect("valid configuration");
        assert_eq!(
            config.command,
            Command::Graph { path: PathBuf::from("out.html"), enable_physics: true }
        );
        assert_eq!(
            config.source,
            Some(Source::Files(vec![PathBuf::from("A.sol"), PathBuf::from("B.sol")]))
        );
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn test_connector_flags() {
        let config = parse(&[
            "--storage",
            "0",
            "-a",
            "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984",
            "--rpc",
            "localhost:8545",
            "--rpc-tls",
            "--rpc-timeout",
            "5",
        ])
        .run_configuration()
        .expect("valid configuration");

        assert_eq!(config.connector.rpc.as_deref(), Some("localhost:8545"));
        assert!(config.connector.tls);
        assert_eq!(config.connector.timeout, Some(Duration::from_secs(5)));
        assert!(config.requires_connector());
    }

    #[test]
    fn test_network_preset() {
        let config = parse(&["--init-db", "--network", "sepolia", "--sync-all"])
            .run_configuration()
            .expect("valid configuration");
        assert_eq!(config.command, Command::InitDb { sync_all: true });
        assert_eq!(config.connector.network, Some(Network::Sepolia));
    }
}
