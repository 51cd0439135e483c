//! docketrace CLI: foreclosure case scraping and skip-trace enrichment.
//!
//! Pulls court cases for a region from the public case-search site, stores
//! them, and enriches defendant addresses with phone numbers.

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
