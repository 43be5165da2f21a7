//! Get-many command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{RecordId, RecordStore};

use crate::output;

#[derive(Args, Debug)]
pub struct GetManyArgs {
    /// Record ids; one line is printed per id, `null` for missing records
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub async fn run(store: &dyn RecordStore, args: GetManyArgs, pretty: bool) -> Result<()> {
    let ids = args
        .ids
        .iter()
        .map(|id| RecordId::new(id).with_context(|| format!("Invalid record id '{}'", id)))
        .collect::<Result<Vec<_>>>()?;

    let records = store
        .get_many(&ids)
        .await
        .context("Failed to get records")?;

    for record in &records {
        output::json(record, pretty)?;
    }

    Ok(())
}
