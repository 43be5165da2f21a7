//! Get queue command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use depot_core::{MessageCounts, Queue, QueueManager, QueueName, QueueOptions};

use crate::output;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Queue name
    pub name: String,
}

#[derive(Serialize)]
struct QueueInfo<'a> {
    name: &'a QueueName,
    options: &'a QueueOptions,
    counts: MessageCounts,
}

pub async fn run<M: QueueManager>(manager: &M, args: GetArgs, pretty: bool) -> Result<()> {
    let queue = super::open(manager, &args.name).await?;

    let counts = queue
        .approximate_count()
        .await
        .context("Failed to count messages")?;

    output::json(
        &QueueInfo {
            name: queue.name(),
            options: queue.options(),
            counts,
        },
        pretty,
    )
}
