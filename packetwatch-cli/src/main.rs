//! ## packetwatch-cli
//! **Operational interface to the capture-and-classify pipeline**
//!
//! - `run`: capture, classify and report until Ctrl-C
//! - `interfaces`: show capture candidates and the one that would be picked
//! - `check-model`: load the classifier artifacts and label two probe packets

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run(args).await,
        Commands::Interfaces(args) => commands::interfaces(args),
        Commands::CheckModel(args) => commands::check_model(args),
    }
}
