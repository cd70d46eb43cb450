// Allow common clippy pedantic lints
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]

//! connectorkit CLI
//!
//! Command-line interface over the provider catalog and connectors

use clap::Parser;
use connectorkit::cli::{Cli, Runner};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let runner = Runner::new(cli);

    let cancel = runner.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    if let Err(e) = runner.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
