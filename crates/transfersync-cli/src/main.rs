//! TransferSync CLI - Command-line interface for TransferSync
//!
//! Provides commands for:
//! - Listing configured sync items and their schedules
//! - Running items immediately
//! - Viewing watermarks and execution history
//! - Previewing folder template resolution
//! - Inspecting and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, history::HistoryCommand,
    items::ItemsCommand, resolve::ResolveCommand, run::RunCommand, status::StatusCommand,
    CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "transfersync",
    version,
    about = "Scheduled remote directory to object storage synchronization"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, env = "TRANSFERSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List configured sync items
    Items(ItemsCommand),
    /// Run sync items now
    Run(RunCommand),
    /// Show watermarks and execution totals
    Status(StatusCommand),
    /// Show past executions
    History(HistoryCommand),
    /// Preview how a folder template resolves
    Resolve(ResolveCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CliContext::new(OutputFormat::from_json_flag(cli.json), cli.config);

    match cli.command {
        Commands::Items(cmd) => cmd.execute(&ctx),
        Commands::Run(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::History(cmd) => cmd.execute(&ctx).await,
        Commands::Resolve(cmd) => cmd.execute(&ctx),
        Commands::Config(cmd) => cmd.execute(&ctx),
        Commands::Completions(cmd) => cmd.execute(),
    }
}
