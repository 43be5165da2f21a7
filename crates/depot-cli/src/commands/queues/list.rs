//! List queues command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::QueueManager;

use crate::output;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list queues whose name starts with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

pub async fn run<M: QueueManager>(manager: &M, args: ListArgs) -> Result<()> {
    let names = manager
        .list_queues(args.prefix.as_deref())
        .await
        .context("Failed to list queues")?;

    if names.is_empty() {
        output::note("No queues found.");
    }

    for name in names {
        println!("{}", name);
    }

    Ok(())
}
