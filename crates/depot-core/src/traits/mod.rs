//! Adapter contracts for record stores and message queues.

mod queue;
mod store;

pub use queue::{Queue, QueueManager, QueueMessage};
pub use store::{CasOutcome, RecordStore, VersionedStore};
