//! Program collections CLI: generates NIAID program collection corrections.
//!
//! Reconciles the program metadata sheet against the discovery catalog and
//! writes per-program correction artifacts for staging and production.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
