mod cli;
mod error;
mod messages;
mod output;
mod runner;
mod utils;

use crate::cli::Args;
use clap::Parser;
use std::process;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, util::TryInitError};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet) {
        eprintln!("Error: failed to initialize logging: {e}");
        process::exit(1);
    }

    // Only startup failures reach here; fetch errors are counted, not returned.
    if let Err(e) = runner::run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<(), TryInitError> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .try_init()
}
