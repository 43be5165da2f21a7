//! depot - CLI tool for exploring depot record stores and queues.
//!
//! A thin wrapper over the `depot` adapters, intended for manual
//! inspection and debugging of a backend directory.

mod cli;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use commands::{queues, records};
use config::Context;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    if let Err(err) = dispatch(cli).await {
        output::error(&format!("{:#}", err));
        std::process::exit(exit_code(&err));
    }
}

/// 2 when the target does not exist, 1 for any other failure.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<depot_core::Error>() {
        Some(err) if err.is_not_found() => 2,
        _ => 1,
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let ctx = Context::resolve(cli.backend.as_deref(), cli.table, cli.pretty)?;

    match cli.command {
        Commands::Records(cmd) => records::handle(cmd, &ctx).await,
        Commands::Queues(cmd) => queues::handle(cmd, &ctx).await,
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays machine-readable.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
