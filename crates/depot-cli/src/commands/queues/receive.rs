//! Receive messages command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use depot_core::{MessageId, Queue, QueueManager, QueueMessage, ReceiptHandle};

use crate::output;

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Queue name
    pub name: String,

    /// Maximum number of messages to receive
    #[arg(long)]
    pub max: Option<usize>,

    /// Seconds to wait for a message (defaults to the queue's wait time)
    #[arg(long)]
    pub wait: Option<u64>,

    /// Acknowledge each message after printing it
    #[arg(long)]
    pub delete: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Received<'a> {
    id: &'a MessageId,
    receipt: &'a ReceiptHandle,
    receive_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
    body: &'a Value,
}

pub async fn run<M: QueueManager>(manager: &M, args: ReceiveArgs, pretty: bool) -> Result<()> {
    let queue = super::open(manager, &args.name).await?;

    let messages = queue
        .receive_messages(args.max, args.wait.map(Duration::from_secs))
        .await
        .context("Failed to receive messages")?;

    if messages.is_empty() {
        output::note("No messages available.");
    }

    for message in &messages {
        output::json(
            &Received {
                id: message.id(),
                receipt: message.receipt(),
                receive_count: message.receive_count(),
                group_id: message.group_id(),
                body: message.body(),
            },
            pretty,
        )?;

        if args.delete {
            message
                .delete()
                .await
                .with_context(|| format!("Failed to delete message {}", message.id()))?;
        }
    }

    Ok(())
}
