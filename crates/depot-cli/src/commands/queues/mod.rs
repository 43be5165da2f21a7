//! Queue subcommand implementations.
//!
//! Commands are generic over [`QueueManager`] so every backend shares one
//! implementation.

mod create;
mod delete;
mod get;
mod list;
mod purge;
mod receive;
mod send;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use depot_core::{QueueManager, QueueName};
use depot_file::FileQueueManager;
use depot_memory::MemoryQueueManager;

use crate::config::{Backend, Context};

#[derive(Args, Debug)]
pub struct QueuesCommand {
    #[command(subcommand)]
    pub command: QueuesSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum QueuesSubcommand {
    /// Create a queue, or return the existing one unchanged
    Create(create::CreateArgs),

    /// Show a queue's options and approximate message counts
    Get(get::GetArgs),

    /// List queue names
    List(list::ListArgs),

    /// Delete a queue and all of its messages
    Delete(delete::DeleteArgs),

    /// Send a message
    Send(send::SendArgs),

    /// Receive messages, optionally acknowledging them
    Receive(receive::ReceiveArgs),

    /// Discard every message in a queue
    Purge(purge::PurgeArgs),
}

pub async fn handle(cmd: QueuesCommand, ctx: &Context) -> Result<()> {
    match &ctx.backend {
        Backend::Memory => dispatch(cmd.command, &MemoryQueueManager::new(), ctx.pretty).await,
        Backend::File(store) => {
            let manager = FileQueueManager::new(store.clone());
            dispatch(cmd.command, &manager, ctx.pretty).await
        }
    }
}

async fn dispatch<M: QueueManager>(
    cmd: QueuesSubcommand,
    manager: &M,
    pretty: bool,
) -> Result<()> {
    match cmd {
        QueuesSubcommand::Create(args) => create::run(manager, args).await,
        QueuesSubcommand::Get(args) => get::run(manager, args, pretty).await,
        QueuesSubcommand::List(args) => list::run(manager, args).await,
        QueuesSubcommand::Delete(args) => delete::run(manager, args).await,
        QueuesSubcommand::Send(args) => send::run(manager, args).await,
        QueuesSubcommand::Receive(args) => receive::run(manager, args, pretty).await,
        QueuesSubcommand::Purge(args) => purge::run(manager, args).await,
    }
}

fn queue_name(raw: &str) -> Result<QueueName> {
    QueueName::new(raw).context("Invalid queue name")
}

/// Open an existing queue.
async fn open<M: QueueManager>(manager: &M, raw: &str) -> Result<M::Queue> {
    let name = queue_name(raw)?;
    manager
        .get_queue(&name)
        .await
        .with_context(|| format!("Failed to open queue '{}'", name))
}
