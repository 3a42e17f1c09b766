//! The compiler interface, and a `solc` backed implementation of it.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Command,
};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{error::Error, utils::strings::decode_hex};

/// The runtime code of one compiled contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Contract name as reported by the compiler.
    pub name: String,
    /// Deployed (runtime) bytecode.
    pub bytecode: Vec<u8>,
}

/// Turns a source file into a single compiled unit.
pub trait Compiler {
    /// Compile the file at `path`. Any failure is an [`Error::Compilation`]
    /// carrying the compiler's diagnostic.
    fn compile(&self, path: &Path) -> Result<CompiledUnit, Error>;
}

/// Invokes a `solc` binary with `--combined-json bin-runtime`.
#[derive(Debug, Clone)]
pub struct Solc {
    executable: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CombinedJson {
    contracts: BTreeMap<String, CombinedContract>,
}

#[derive(Debug, Deserialize)]
struct CombinedContract {
    #[serde(rename = "bin-runtime", default)]
    bin_runtime: String,
}

impl Solc {
    /// Use the compiler binary at `executable`.
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self { executable: executable.into() }
    }

    /// The compiler binary this instance invokes.
    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Default for Solc {
    fn default() -> Self {
        Self::new("solc")
    }
}

impl Compiler for Solc {
    fn compile(&self, path: &Path) -> Result<CompiledUnit, Error> {
        let failed = |diagnostic: String| Error::Compilation {
            path: path.display().to_string(),
            diagnostic,
        };

        debug!("compiling '{}' with '{}'", path.display(), self.executable.display());
        let output = Command::new(&self.executable)
            .arg("--combined-json")
            .arg("bin-runtime")
            .arg(path)
            .output()
            .map_err(|e| {
                failed(format!("unable to run compiler '{}': {}", self.executable.display(), e))
            })?;

        if !output.status.success() {
            return Err(failed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("compiler output: {}", stdout);
        let combined: CombinedJson = serde_json::from_str(&stdout)
            .map_err(|e| failed(format!("unexpected compiler output: {e}")))?;

        select_unit(path, combined).map_err(failed)
    }
}

/// Pick the contract named after the file stem, falling back to the last contract
/// with non-empty runtime code.
fn select_unit(path: &Path, combined: CombinedJson) -> Result<CompiledUnit, String> {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();

    let units = combined
        .contracts
        .into_iter()
        .filter(|(_, contract)| !contract.bin_runtime.is_empty())
        .map(|(key, contract)| {
            let name = key.rsplit(':').next().unwrap_or(&key).to_string();
            (name, contract.bin_runtime)
        })
        .collect::<Vec<_>>();

    let (name, bin) = units
        .iter()
        .find(|(name, _)| *name == stem)
        .or_else(|| units.last())
        .cloned()
        .ok_or_else(|| "no deployable contract found in compiler output".to_string())?;

    let bytecode = decode_hex(&bin).map_err(|e| format!("invalid bytecode for {name}: {e}"))?;
    Ok(CompiledUnit { name, bytecode })
}
