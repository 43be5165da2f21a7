//! Delete queue command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::QueueManager;

use crate::output;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Queue name
    pub name: String,
}

pub async fn run<M: QueueManager>(manager: &M, args: DeleteArgs) -> Result<()> {
    let name = super::queue_name(&args.name)?;

    manager
        .delete_queue(&name)
        .await
        .context("Failed to delete queue")?;

    output::success(&format!("Deleted queue {}", name));

    Ok(())
}
