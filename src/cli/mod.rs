pub mod classify;
pub mod parse;
pub mod run;
pub mod schema;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flaketriage")]
#[command(
    author,
    version,
    about = "Flaky-aware test failure triage and retry engine for pre-merge CI"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Triage a change: run the suite, confirm failures, report a verdict
    Run(RunArgs),

    /// Parse a saved result blob and print the normalized results
    Parse(ParseArgs),

    /// Classify saved stage results offline
    Classify(ClassifyArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "triage.yaml")]
    pub config: PathBuf,

    /// Identifier of the change under test
    #[arg(long, env = "TRIAGE_CHANGE_ID")]
    pub change_id: String,

    /// Change author, added to the new-failure report
    #[arg(long, env = "TRIAGE_AUTHOR")]
    pub author: Option<String>,

    /// Worker host name, shown in notifications
    #[arg(long, env = "TRIAGE_HOST")]
    pub host: Option<String>,

    /// Queue or lane name, shown in notifications
    #[arg(long, env = "TRIAGE_LANE")]
    pub lane: Option<String>,

    /// Mark tests the change touches since this ref (e.g., main, HEAD~1)
    #[arg(long)]
    pub diff_base: Option<String>,

    /// Environment override passed to every stage (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Override the retry budget
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Override output directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Show plan without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Suite command, overriding `executor.command` from the config
    #[arg(last = true)]
    pub command: Vec<String>,
}

#[derive(Parser, Clone)]
pub struct ParseArgs {
    /// Result artifact or captured runner stdout
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Config file (for envelope and relevance settings)
    #[arg(short, long, default_value = "triage.yaml")]
    pub config: PathBuf,

    /// Keep support and expectation files in the output
    #[arg(long)]
    pub no_filter: bool,
}

#[derive(Parser, Clone)]
pub struct ClassifyArgs {
    /// First full run with the change applied
    #[arg(long, value_name = "FILE")]
    pub with_change: PathBuf,

    /// Repeat of the failing subset with the change applied
    #[arg(long, value_name = "FILE")]
    pub repeat_with_change: Option<PathBuf>,

    /// Repeat of the failing subset without the change
    #[arg(long, value_name = "FILE")]
    pub repeat_without_change: Option<PathBuf>,

    /// Clean-tree baseline run
    #[arg(long, value_name = "FILE")]
    pub clean_tree: Option<PathBuf>,

    /// Config file (for envelope and relevance settings)
    #[arg(short, long, default_value = "triage.yaml")]
    pub config: PathBuf,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
