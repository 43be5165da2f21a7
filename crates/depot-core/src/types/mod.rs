//! Identifier types.
//!
//! These types enforce naming invariants at construction time, so adapters
//! can use them as storage keys and path segments without re-validating.

mod backend_url;
mod queue_name;
mod record_id;

pub use backend_url::BackendUrl;
pub use queue_name::QueueName;
pub use record_id::RecordId;
