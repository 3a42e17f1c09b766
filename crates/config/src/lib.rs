//! Configuration management for argus
//!
//! This crate resolves the argus data directory, which holds the signature
//! catalog, the contract database and `config.toml`, and loads the settings
//! stored in that file.

/// Error types for the configuration module
pub mod error;

use std::path::{Path, PathBuf};

use crate::error::Error;
use argus_common::utils::{
    env::get_env,
    io::file::{expand_home, read_file, write_file},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ARGUS_DIR";

/// Environment variable overriding the compiler binary.
pub const SOLC_ENV: &str = "SOLC";

/// The directory argus keeps its persistent state in. Defaults to `~/.argus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir(PathBuf);

impl DataDir {
    /// Resolve the data directory from `ARGUS_DIR`, falling back to `~/.argus`.
    #[allow(deprecated)]
    pub fn resolve() -> Result<Self, Error> {
        if let Some(dir) = get_env(DATA_DIR_ENV) {
            return Ok(Self(expand_home(&dir)));
        }

        let mut home = std::env::home_dir().ok_or_else(|| {
            Error::Generic(format!(
                "failed to get home directory. set {DATA_DIR_ENV} to choose a data directory"
            ))
        })?;
        home.push(".argus");
        Ok(Self(home))
    }

    /// Use an explicit directory.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self(path.into())
    }

    /// The directory itself.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Location of the persisted signature catalog.
    pub fn signatures_file(&self) -> PathBuf {
        self.0.join("signatures.json")
    }

    /// Location of the contract database used by search and init-db.
    pub fn contracts_file(&self) -> PathBuf {
        self.0.join("contracts.bin")
    }

    /// Location of the configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.0.join("config.toml")
    }
}

/// The [`Configuration`] struct represents the contents of `config.toml`. Values
/// given on the command line take precedence over it.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Configuration {
    /// The URL for the Ethereum RPC endpoint
    pub rpc_url: String,

    /// The URL for a local Ethereum RPC endpoint, used when nothing else is configured
    pub local_rpc_url: String,

    /// Path to the solidity compiler
    pub solc_path: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            rpc_url: "".to_string(),
            local_rpc_url: argus_common::constants::DEFAULT_LOCAL_RPC.to_string(),
            solc_path: "solc".to_string(),
        }
    }
}

impl Configuration {
    /// Returns the configuration stored in `dir`, creating the file with defaults if it
    /// does not exist yet. A MESC default endpoint, when configured, overrides `rpc_url`.
    pub fn load(dir: &DataDir) -> Result<Self, Error> {
        let path = dir.config_file();

        // if the config file doesn't exist, create it
        if !path.exists() {
            Configuration::default().save(dir)?;
        }

        let contents = read_file(&path)
            .map_err(|e| Error::Generic(format!("failed to read config file: {e}")))?;
        let mut config: Configuration = toml::from_str(&contents)
            .map_err(|e| Error::ParseError(format!("failed to parse config file: {e}")))?;

        // load mesc config if enabled
        if mesc::is_mesc_enabled() {
            if let Some(endpoint) = mesc::get_default_endpoint(Some("argus"))? {
                debug!("overriding rpc_url with mesc endpoint");
                config.rpc_url = endpoint.url;
            }
        }

        Ok(config)
    }

    /// Saves the configuration to `dir`.
    pub fn save(&self, dir: &DataDir) -> Result<(), Error> {
        write_file(
            dir.config_file(),
            &toml::to_string(&self)
                .map_err(|e| Error::ParseError(format!("failed to serialize config: {e}")))?,
        )
        .map_err(|e| Error::Generic(format!("failed to write config file: {e}")))?;

        Ok(())
    }

    /// The compiler binary to invoke: `SOLC` if set, otherwise `solc_path`.
    pub fn solc_executable(&self) -> String {
        get_env(SOLC_ENV).unwrap_or_else(|| self.solc_path.clone())
    }
}

/// Resolve a user supplied endpoint, allowing MESC endpoint names and aliases.
pub fn parse_url_arg(url: &str) -> String {
    if mesc::is_mesc_enabled() {
        if let Ok(Some(endpoint)) = mesc::get_endpoint_by_query(url, Some("argus")) {
            return endpoint.url;
        }
    }
    url.to_string()
}
