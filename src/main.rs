use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod classifier;
mod cli;
mod config;
mod discovery;
mod error;
mod executor;
mod notify;
mod output;
mod parser;
mod runner;
mod verdict;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("flaketriage=debug")
    } else {
        EnvFilter::new("flaketriage=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Parse(args) => cli::parse::execute(args),
        Commands::Classify(args) => cli::classify::execute(args),
        Commands::Schema => cli::schema::execute(),
    }
}
