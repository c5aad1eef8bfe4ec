//! lessongen CLI: batch lesson-content generation for curriculum skills.
//!
//! Reads skills from the record store, generates lesson content for the
//! ones that have none, and writes the results back.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    commands::load_dotenv()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
