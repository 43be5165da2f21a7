//! depot-file - Filesystem-backed record store and message queue.
//!
//! Everything lives under one root directory:
//!
//! ```text
//! <root>/
//!   tables/<table>/table.lock
//!   tables/<table>/records/<id>.json     versioned record
//!   queues.lock                          serializes queue create/delete
//!   queues/<name>/queue.lock
//!   queues/<name>/queue.json             options plus message ledger
//! ```
//!
//! Writers take an exclusive advisory lock and replace files by writing a
//! temporary file and renaming it over the target, so readers never see a
//! partial write and several processes can share one root.

mod queue;
mod records;
mod store;

pub use queue::{DEFAULT_POLL_INTERVAL, FileMessage, FileQueue, FileQueueManager};
pub use records::FileRecordStore;
pub use store::FileStore;
