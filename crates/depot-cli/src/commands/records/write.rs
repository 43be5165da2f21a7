//! Create, update and upsert command implementations.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Record, RecordStore};

use crate::commands::parse_json;
use crate::output;

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Record as a JSON object, including its "id"
    pub record: String,
}

#[derive(Debug, Clone, Copy)]
pub enum Mode {
    Create,
    Update,
    Upsert,
}

pub async fn run(
    store: &dyn RecordStore,
    mode: Mode,
    args: WriteArgs,
    pretty: bool,
) -> Result<()> {
    let value = parse_json(&args.record, "record")?;
    let record = Record::from_json(value).context("Invalid record")?;

    let stored = match mode {
        Mode::Create => store.create(record).await.context("Failed to create record")?,
        Mode::Update => store.update(record).await.context("Failed to update record")?,
        Mode::Upsert => store.upsert(record).await.context("Failed to upsert record")?,
    };

    output::json(&stored, pretty)
}
