mod connector;
mod run;

pub use connector::{ConnectorConfig, Network};
pub use run::{Command, RunConfiguration, RunConfigurationBuilder, Source};
