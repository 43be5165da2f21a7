//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::queues::QueuesCommand;
use crate::commands::records::RecordsCommand;

/// Record store and message queue explorer.
#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(author, version = env!("DEPOT_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Backend URL (file:///path or memory:); defaults to the platform data directory
    #[arg(long, env = "DEPOT_BACKEND", global = true)]
    pub backend: Option<String>,

    /// Record table to operate on
    #[arg(long, env = "DEPOT_TABLE", default_value = "default", global = true)]
    pub table: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record store operations
    Records(RecordsCommand),

    /// Message queue operations
    Queues(QueuesCommand),
}
