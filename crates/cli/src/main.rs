pub(crate) mod args;
pub(crate) mod error;
pub(crate) mod log_args;

use std::io::Write;

use args::Arguments;
use clap::Parser;
use colored::Colorize;
use error::Error;
use log_args::ColorMode;
use tracing::{debug, info};

use argus_common::ether::{
    compiler::Solc,
    provider::{ChainSource, MultiTransportProvider},
};
use argus_config::{Configuration, DataDir};
use argus_core::{run, Command, Context, Source, USAGE};

#[tokio::main]
async fn main() {
    let args = Arguments::parse();

    if args.logs.color == ColorMode::Never {
        colored::control::set_override(false);
    }

    // setup logging
    let guard = args.logs.init_tracing();
    if let Err(e) = &guard {
        eprintln!("{} failed to initialize logging: {}", "warning:".yellow().bold(), e);
    }

    if let Err(e) = execute(&args).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        drop(guard);
        std::process::exit(1);
    }
}

async fn execute(args: &Arguments) -> Result<(), Error> {
    let config = args.run_configuration()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    // usage needs no data directory, configuration or node
    if config.command == Command::Help {
        write!(out, "{USAGE}")?;
        return Ok(());
    }

    config.validate()?;

    let data_dir = DataDir::resolve()?;
    debug!("using data directory '{}'", data_dir.path().display());

    let settings = if config.requires_connector() ||
        matches!(config.source, Some(Source::Files(_)))
    {
        Configuration::load(&data_dir)?
    } else {
        Configuration::default()
    };

    let provider = if config.requires_connector() {
        let endpoint = config.connector.endpoint(&settings);
        let provider = MultiTransportProvider::connect(&endpoint).await?;
        info!("connected to {}", provider.endpoint());
        Some(provider.with_timeout(config.connector.timeout))
    } else {
        None
    };

    let compiler = Solc::new(settings.solc_executable());
    let context = Context {
        data_dir,
        compiler: &compiler,
        connector: provider.as_ref().map(|p| p as &dyn ChainSource),
    };

    run(&config, &context, &mut out).await?;
    out.flush()?;
    Ok(())
}
