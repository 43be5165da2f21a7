//! Delete record command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{RecordId, RecordStore};

use crate::output;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Record id
    pub id: String,
}

pub async fn run(store: &dyn RecordStore, args: DeleteArgs) -> Result<()> {
    let id = RecordId::new(&args.id).context("Invalid record id")?;

    store
        .delete(&id)
        .await
        .context("Failed to delete record")?;

    output::success(&format!("Deleted record {}", id));

    Ok(())
}
