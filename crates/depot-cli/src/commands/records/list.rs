//! List records command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Cursor, RecordStore};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of records to return
    #[arg(long)]
    pub limit: Option<usize>,

    /// Pagination cursor from a previous page
    #[arg(long)]
    pub cursor: Option<String>,
}

pub async fn run(store: &dyn RecordStore, args: ListArgs, pretty: bool) -> Result<()> {
    let page = store
        .get_all(args.cursor.map(Cursor::new), args.limit)
        .await
        .context("Failed to list records")?;

    super::print_page(&page, pretty)
}
