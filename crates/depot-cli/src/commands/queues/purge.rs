//! Purge queue command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Queue, QueueManager};

use crate::output;

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Queue name
    pub name: String,
}

pub async fn run<M: QueueManager>(manager: &M, args: PurgeArgs) -> Result<()> {
    let queue = super::open(manager, &args.name).await?;

    let purged = queue.purge().await.context("Failed to purge queue")?;

    output::success(&format!("Purged {} messages from {}", purged, queue.name()));

    Ok(())
}
