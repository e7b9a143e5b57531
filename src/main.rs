mod cli;
mod error;
mod logging;
mod manager;
mod model;
mod orchestrator;
mod process_table;
mod relocate;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_interactive = args.is_interactive();

    match cli::run(args).await {
        Ok(true) => {
            // Explicitly exit with code 0 on success for non-TUI modes
            if !is_interactive {
                std::process::exit(0);
            }
            Ok(())
        }
        // The outcome text has already been printed.
        Ok(false) => std::process::exit(1),
        Err(e) => Err(e),
    }
}
