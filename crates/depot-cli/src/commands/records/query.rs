//! Query command implementation.

use anyhow::{Context, Result};
use clap::Args;

use depot_core::{Cursor, Filter, Query, RecordStore, SortDirection};

use crate::commands::parse_json;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// JSON filter, e.g. '{"age": {"$gte": 18}, "$or": [...]}'; matches everything when omitted
    #[arg(long)]
    pub filter: Option<String>,

    /// Field path to sort by (defaults to id)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort direction (asc or desc)
    #[arg(long, default_value = "asc")]
    pub order: SortDirection,

    /// Maximum number of records to return
    #[arg(long)]
    pub limit: Option<usize>,

    /// Pagination cursor from a previous page of the same query
    #[arg(long)]
    pub cursor: Option<String>,
}

pub async fn run(store: &dyn RecordStore, args: QueryArgs, pretty: bool) -> Result<()> {
    let filter = match &args.filter {
        Some(raw) => Filter::from_json(&parse_json(raw, "filter")?).context("Invalid filter")?,
        None => Filter::All,
    };

    let query = Query {
        filter,
        cursor: args.cursor.map(Cursor::new),
        page_size: args.limit,
        sort_key: args.sort,
        sort: args.order,
    };

    let page = store.query(&query).await.context("Failed to query records")?;

    super::print_page(&page, pretty)
}
