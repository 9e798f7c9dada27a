use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// File-backed recurring task manager.
/// Storage defaults to ~/.tasksetu/tasks.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "tasksetu", version, about = "Recurring task scheduling CLI")]
pub struct Cli {
    /// Path to the JSON database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to the JSON config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}
