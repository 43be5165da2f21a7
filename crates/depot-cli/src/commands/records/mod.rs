//! Record store subcommand implementations.

mod delete;
mod fields;
mod get;
mod get_many;
mod list;
mod query;
mod write;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use depot_core::Page;

use crate::config::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct RecordsCommand {
    #[command(subcommand)]
    pub command: RecordsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RecordsSubcommand {
    /// Fetch a single record
    Get(get::GetArgs),

    /// Fetch several records by id
    GetMany(get_many::GetManyArgs),

    /// List every record, ordered by id
    List(list::ListArgs),

    /// Query records with a JSON filter
    Query(query::QueryArgs),

    /// Create a record; fails if the id exists
    Create(write::WriteArgs),

    /// Merge fields into an existing record
    Update(write::WriteArgs),

    /// Merge fields into a record, creating it if absent
    Upsert(write::WriteArgs),

    /// Delete a record
    Delete(delete::DeleteArgs),

    /// Add to a numeric field
    Increment(fields::IncrementArgs),

    /// Append a value to a list field
    Append(fields::FieldArgs),

    /// Remove every occurrence of a value from a list field
    Remove(fields::FieldArgs),

    /// Add a value to a set field
    AddToSet(fields::FieldArgs),

    /// Remove a value from a set field
    RemoveFromSet(fields::FieldArgs),
}

pub async fn handle(cmd: RecordsCommand, ctx: &Context) -> Result<()> {
    let store = ctx.record_store()?;
    let store = store.as_ref();
    store
        .connect()
        .await
        .context("Failed to connect to record store")?;

    let pretty = ctx.pretty;
    let result = match cmd.command {
        RecordsSubcommand::Get(args) => get::run(store, args, pretty).await,
        RecordsSubcommand::GetMany(args) => get_many::run(store, args, pretty).await,
        RecordsSubcommand::List(args) => list::run(store, args, pretty).await,
        RecordsSubcommand::Query(args) => query::run(store, args, pretty).await,
        RecordsSubcommand::Create(args) => {
            write::run(store, write::Mode::Create, args, pretty).await
        }
        RecordsSubcommand::Update(args) => {
            write::run(store, write::Mode::Update, args, pretty).await
        }
        RecordsSubcommand::Upsert(args) => {
            write::run(store, write::Mode::Upsert, args, pretty).await
        }
        RecordsSubcommand::Delete(args) => delete::run(store, args).await,
        RecordsSubcommand::Increment(args) => fields::increment(store, args, pretty).await,
        RecordsSubcommand::Append(args) => {
            fields::run(store, fields::FieldOp::Append, args, pretty).await
        }
        RecordsSubcommand::Remove(args) => {
            fields::run(store, fields::FieldOp::Remove, args, pretty).await
        }
        RecordsSubcommand::AddToSet(args) => {
            fields::run(store, fields::FieldOp::AddToSet, args, pretty).await
        }
        RecordsSubcommand::RemoveFromSet(args) => {
            fields::run(store, fields::FieldOp::RemoveFromSet, args, pretty).await
        }
    };

    store.disconnect().await?;
    result
}

/// Print a page of records, one per line, and the next cursor on stderr.
fn print_page(page: &Page, pretty: bool) -> Result<()> {
    if page.items.is_empty() {
        output::note("No records found.");
    }

    for record in &page.items {
        output::json(record, pretty)?;
    }

    if let Some(cursor) = &page.last {
        output::note(&format!("Next cursor: {}", cursor));
    }

    Ok(())
}
