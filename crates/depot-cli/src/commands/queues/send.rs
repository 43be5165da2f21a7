//! Send message command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Queue, QueueManager, SendOptions};

use crate::commands::parse_value;
use crate::output;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Queue name
    pub name: String,

    /// Message body as JSON; bare words are sent as strings
    pub body: String,

    /// Seconds before the message becomes visible
    #[arg(long)]
    pub delay: Option<u64>,

    /// Message group (FIFO queues)
    #[arg(long)]
    pub group_id: Option<String>,

    /// Deduplication id (FIFO queues)
    #[arg(long)]
    pub deduplication_id: Option<String>,
}

pub async fn run<M: QueueManager>(manager: &M, args: SendArgs) -> Result<()> {
    let queue = super::open(manager, &args.name).await?;

    let options = SendOptions {
        delay: args.delay.map(Duration::from_secs),
        group_id: args.group_id,
        deduplication_id: args.deduplication_id,
    };

    let id = queue
        .send_message_with(parse_value(&args.body), options)
        .await
        .context("Failed to send message")?;

    output::field("Message ID", id.as_str());
    output::success(&format!("Sent message to {}", queue.name()));

    Ok(())
}
