//! weft host binary.

mod cli;
mod commands;
mod config;
mod host;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    weft_observability::init_logging(&cli.logs)?;

    match cli.command {
        Commands::Start(args) => commands::start::run(args).await,
    }
}
