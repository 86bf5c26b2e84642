//! recruitreport CLI: monthly recruitment report automation.
//!
//! Reads the source workbook, analyzes it, has Gemini write the report,
//! publishes it to Confluence and announces it in Slack.

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
