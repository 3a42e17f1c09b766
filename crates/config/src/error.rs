//! Error types for the configuration module

use mesc::MescError;

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A generic error with a message
    #[error("Error: {0}")]
    Generic(String),

    /// The configuration file could not be parsed or serialized
    #[error("Parse error: {0}")]
    ParseError(String),

    /// An error from the MESC (Multiple Endpoint Shared Configuration) system
    #[error("MESC error: {0}")]
    MescError(#[from] MescError),
}

impl From<Error> for argus_common::Error {
    fn from(err: Error) -> Self {
        argus_common::Error::Configuration(err.to_string())
    }
}
