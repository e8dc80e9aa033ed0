//! researchflow CLI: research a topic and save article summaries.
//!
//! Searches for news articles about a topic, summarizes each one with a
//! completion model, and writes the summaries to a text file.

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
