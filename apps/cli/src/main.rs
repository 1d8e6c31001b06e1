//! arxivsummary CLI: incremental arXiv fetching with batch summarization.
//!
//! Each `run` fetches papers newer than the stored cursor, summarizes them with
//! Gemini and writes a Markdown report. The cursor only moves when every paper
//! was summarized.

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
