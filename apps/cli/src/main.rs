//! docgraph CLI: pre-publish validation for learning-path documentation.
//!
//! Checks the content hierarchy of a docset, dry-syncs it against the
//! hierarchy service, and reconciles localized publish manifests.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
