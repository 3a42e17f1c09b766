//! Contract database errors

/// Errors raised while reading or writing the contract database
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic error
    #[error("Error: {0}")]
    Generic(String),
    /// The database file is not a valid encoding
    #[error("contract database is corrupt: {0}")]
    Bincode(#[from] bincode::Error),
    /// An IO error occurred
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

impl From<Error> for argus_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::IOError(e) => argus_common::Error::Io(e),
            other => argus_common::Error::Eyre(eyre::eyre!(other.to_string())),
        }
    }
}
