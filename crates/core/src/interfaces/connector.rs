use std::{
    fmt::{self, Display},
    path::PathBuf,
    time::Duration,
};

use argus_config::{parse_url_arg, Configuration};
use clap::ValueEnum;

/// Well-known networks selectable with `--network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Network {
    /// Ethereum mainnet
    Mainnet,
    /// Sepolia testnet
    Sepolia,
    /// Holesky testnet
    Holesky,
    /// A node on this machine
    Local,
}

impl Network {
    /// The endpoint used for this network.
    pub fn url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://ethereum-rpc.publicnode.com",
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Holesky => "https://ethereum-holesky-rpc.publicnode.com",
            Network::Local => argus_common::constants::DEFAULT_LOCAL_RPC,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Sepolia => write!(f, "sepolia"),
            Network::Holesky => write!(f, "holesky"),
            Network::Local => write!(f, "local"),
        }
    }
}

/// How to reach a node. The first of `ipc`, `network` and `rpc` that is set wins,
/// then `rpc_url` and finally `local_rpc_url` from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Path to an IPC socket.
    pub ipc: Option<PathBuf>,
    /// A preset network.
    pub network: Option<Network>,
    /// `host:port`, a full URL, or a MESC endpoint name.
    pub rpc: Option<String>,
    /// Use https for a bare `host:port`.
    pub tls: bool,
    /// Per-request timeout. Requests are never retried.
    pub timeout: Option<Duration>,
}

impl ConnectorConfig {
    /// The endpoint to connect to.
    pub fn endpoint(&self, settings: &Configuration) -> String {
        if let Some(ipc) = &self.ipc {
            return ipc.display().to_string();
        }
        if let Some(network) = self.network {
            return network.url().to_string();
        }
        if let Some(rpc) = &self.rpc {
            let rpc = parse_url_arg(rpc);
            if rpc.contains("://") {
                return rpc;
            }
            let scheme = if self.tls { "https" } else { "http" };
            return format!("{scheme}://{rpc}");
        }
        if !settings.rpc_url.is_empty() {
            return settings.rpc_url.clone();
        }
        settings.local_rpc_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_precedence() {
        let settings = Configuration {
            rpc_url: "https://configured.example".to_string(),
            ..Default::default()
        };

        let mut config = ConnectorConfig {
            ipc: Some(PathBuf::from("/tmp/geth.ipc")),
            network: Some(Network::Sepolia),
            rpc: Some("localhost:7545".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(&settings), "/tmp/geth.ipc");

        config.ipc = None;
        assert_eq!(config.endpoint(&settings), Network::Sepolia.url());

        config.network = None;
        assert_eq!(config.endpoint(&settings), "http://localhost:7545");

        config.tls = true;
        assert_eq!(config.endpoint(&settings), "https://localhost:7545");

        config.rpc = None;
        assert_eq!(config.endpoint(&settings), "https://configured.example");
    }

    #[test]
    fn test_endpoint_falls_back_to_local() {
        let config = ConnectorConfig::default();
        assert_eq!(config.endpoint(&Configuration::default()), "http://localhost:8545");
    }

    #[test]
    fn test_full_url_passes_through() {
        let config = ConnectorConfig {
            rpc: Some("wss://node.example/ws".to_string()),
            tls: true,
            ..Default::default()
        };
        assert_eq!(config.endpoint(&Configuration::default()), "wss://node.example/ws");
    }
}
