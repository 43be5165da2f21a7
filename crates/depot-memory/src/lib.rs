//! depot-memory - In-memory record store and message queue.
//!
//! Nothing is persisted; every store and queue manager owns its own state.
//! These adapters are the reference against which other backends are
//! checked, and are handy in tests of code written against the
//! `depot-core` traits.

mod queue;
mod store;

pub use queue::{MemoryMessage, MemoryQueue, MemoryQueueManager};
pub use store::MemoryRecordStore;
