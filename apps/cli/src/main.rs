//! fdrdict CLI: FDR event dictionary generator.
//!
//! Fetches the vendor's event-schema catalog, writes it as JSON, and tags
//! each entry with a readable name and topical keywords.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli)?;
    commands::run(cli).await
}
