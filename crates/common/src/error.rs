//! Error type shared by every argus crate.

/// Generic error type for argus operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable input or operation was supplied.
    #[error("{0}")]
    Configuration(String),
    /// More source files were given than there are indexed addresses.
    #[error("too many input files: {count} given, at most {max} contracts can be loaded per run")]
    TooManyContracts {
        /// number of files supplied
        count: usize,
        /// upper bound on indexed addresses
        max: usize,
    },
    /// The address is not `0x` followed by 40 hex characters.
    #[error("invalid address '{0}': expected 0x followed by 40 hexadecimal characters")]
    InvalidAddress(String),
    /// The storage index could not be parsed as an integer.
    #[error("invalid storage index '{0}': expected a decimal or 0x-prefixed hexadecimal integer")]
    InvalidIndex(String),
    /// A command that reads chain state was run without an address.
    #[error("this command requires a contract address (-a/--address)")]
    MissingAddress,
    /// The supplied bytecode is not well-formed hex, or is empty.
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
    /// The supplied call data is not well-formed hex.
    #[error("invalid call data: {0}")]
    InvalidCallData(String),
    /// The database search expression could not be parsed.
    #[error("invalid search expression: {0}")]
    InvalidExpression(String),
    /// The node connector failed at the transport level.
    #[error("unable to reach node at '{endpoint}': {reason} (check the node flags or rpc_url)")]
    ConnectorUnavailable {
        /// the endpoint that was used
        endpoint: String,
        /// transport diagnostic
        reason: String,
    },
    /// The node returned no code for the address.
    #[error("no code at {0}: is the address correct, and is this the right network?")]
    EmptyCode(String),
    /// The compiler rejected a source file.
    #[error("failed to compile '{path}':\n{diagnostic}")]
    Compilation {
        /// the source file
        path: String,
        /// compiler output
        diagnostic: String,
    },
    /// The signature catalog exists but is not a JSON object of selector strings.
    #[error("signature catalog '{path}' is corrupt: {diagnostic}")]
    CorruptCatalog {
        /// catalog location
        path: String,
        /// parser diagnostic
        diagnostic: String,
    },
    /// An output file could not be written.
    #[error("failed to write '{path}': {reason}")]
    Output {
        /// destination path
        path: String,
        /// io diagnostic
        reason: String,
    },
    /// Wrapped io error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapped json error
    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Wrapped eyre report
    #[error(transparent)]
    Eyre(#[from] eyre::Report),
}
