//! Create queue command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Queue, QueueManager, QueueOptions};

use crate::output;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Queue name; FIFO queue names end in .fifo
    pub name: String,

    /// Seconds a received message stays hidden from other consumers
    #[arg(long)]
    pub visibility_timeout: Option<u64>,

    /// Seconds every new message waits before its first delivery
    #[arg(long)]
    pub delay: Option<u64>,

    /// Seconds a message is kept before it is discarded
    #[arg(long)]
    pub retention: Option<u64>,

    /// Default long-poll wait for receives, in seconds
    #[arg(long)]
    pub wait_time: Option<u64>,

    /// Queue that receives messages after too many deliveries
    #[arg(long, requires = "max_receive_count")]
    pub dead_letter_queue: Option<String>,

    /// Deliveries allowed before a message is dead-lettered
    #[arg(long)]
    pub max_receive_count: Option<u32>,

    /// Deliver in order within each message group
    #[arg(long)]
    pub fifo: bool,

    /// Record that the queue should be encrypted at rest
    #[arg(long)]
    pub encrypted: bool,
}

pub async fn run<M: QueueManager>(manager: &M, args: CreateArgs) -> Result<()> {
    let name = super::queue_name(&args.name)?;
    let dead_letter_queue = args
        .dead_letter_queue
        .as_deref()
        .map(super::queue_name)
        .transpose()?;

    let options = QueueOptions {
        delay_seconds: args.delay,
        message_retention_seconds: args.retention,
        dead_letter_queue,
        max_receive_count: args.max_receive_count,
        visibility_timeout_seconds: args.visibility_timeout,
        receive_message_wait_time_seconds: args.wait_time,
        encrypted: args.encrypted.then_some(true),
        fifo: args.fifo.then_some(true),
    };

    let queue = manager
        .create_queue(&name, options)
        .await
        .context("Failed to create queue")?;

    output::field("Name", queue.name().as_str());
    output::field("Options", &serde_json::to_string(queue.options())?);
    output::success(&format!("Queue {} ready", queue.name()));

    Ok(())
}
