#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Argus(#[from] argus_common::Error),
    #[error(transparent)]
    Config(#[from] argus_config::error::Error),
    #[error("invalid arguments: {0}")]
    Arguments(String),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}
