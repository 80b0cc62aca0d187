//! stacshift CLI — republish harvested STAC catalog entries.
//!
//! Drives the change-set transformation pipeline (link rewriting, workflow
//! synthesis, render annotation, JSON patching) against a local object
//! store for operational runs and debugging.

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
