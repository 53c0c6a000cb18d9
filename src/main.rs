mod backend;
mod cli;
mod error;
mod logging;
mod model;
mod orchestrator;
mod scenario;
mod text_summary;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_silent = args.silent;

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_silent {
                println!("{:#}", e);
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
