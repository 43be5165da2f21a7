//! Field mutation command implementations.
//!
//! Each command applies one atomic change to a single field and prints the
//! resulting record.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{FieldValue, RecordId, RecordStore};

use crate::commands::{parse_json, parse_value};
use crate::output;

#[derive(Args, Debug)]
pub struct IncrementArgs {
    /// Record id
    pub id: String,

    /// Field to increment; created at the delta when absent
    pub key: String,

    /// Amount to add (integer or float, may be negative)
    #[arg(long, default_value = "1", allow_negative_numbers = true)]
    pub by: String,
}

#[derive(Args, Debug)]
pub struct FieldArgs {
    /// Record id
    pub id: String,

    /// Field to change
    pub key: String,

    /// Value as JSON; bare words are taken as strings
    pub value: String,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldOp {
    Append,
    Remove,
    AddToSet,
    RemoveFromSet,
}

pub async fn increment(store: &dyn RecordStore, args: IncrementArgs, pretty: bool) -> Result<()> {
    let id = RecordId::new(&args.id).context("Invalid record id")?;
    let delta = FieldValue::from(parse_json(&args.by, "delta")?)
        .as_number()
        .context("Delta must be a number")?;

    let record = store
        .increment(&id, &args.key, delta)
        .await
        .context("Failed to increment field")?;

    output::json(&record, pretty)
}

pub async fn run(
    store: &dyn RecordStore,
    op: FieldOp,
    args: FieldArgs,
    pretty: bool,
) -> Result<()> {
    let id = RecordId::new(&args.id).context("Invalid record id")?;
    let value = FieldValue::from(parse_value(&args.value));

    let record = match op {
        FieldOp::Append => store.append_to_list(&id, &args.key, value).await,
        FieldOp::Remove => store.remove_from_list(&id, &args.key, value).await,
        FieldOp::AddToSet => store.add_to_set(&id, &args.key, value).await,
        FieldOp::RemoveFromSet => store.remove_from_set(&id, &args.key, value).await,
    }
    .with_context(|| format!("Failed to update field '{}'", args.key))?;

    output::json(&record, pretty)
}
