//! Record data model and the machinery shared by record store adapters.
//!
//! The operations themselves are methods on
//! [`RecordStore`](crate::RecordStore).

mod filter;
mod model;
mod mutation;
mod query;
mod value;

pub use filter::Filter;
pub use model::{ID_FIELD, Record};
pub use mutation::{
    DEFAULT_MAX_CAS_ATTEMPTS, FieldMutation, Version, Versioned, apply_with_cas,
};
pub use query::{
    Cursor, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, Query, SortDirection, paginate,
};
pub use value::{FieldValue, Number, SET_MARKER};
