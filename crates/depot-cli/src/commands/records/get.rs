//! Get record command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Error, RecordId, RecordStore};

use crate::output;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Record id
    pub id: String,
}

pub async fn run(store: &dyn RecordStore, args: GetArgs, pretty: bool) -> Result<()> {
    let id = RecordId::new(&args.id).context("Invalid record id")?;

    let record = store
        .get_one(&id)
        .await
        .context("Failed to get record")?
        .ok_or_else(|| Error::record_not_found(id.as_str()))?;

    output::json(&record, pretty)
}
