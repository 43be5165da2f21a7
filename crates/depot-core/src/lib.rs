//! depot-core - Record store and message queue contracts.
//!
//! This crate defines the two adapter contracts ([`RecordStore`] and
//! [`QueueManager`]/[`Queue`]/[`QueueMessage`]) together with the data model
//! they exchange and the backend-agnostic machinery adapters share: the
//! query and pagination engine, the compare-and-swap field mutation loop,
//! and the message ledger that implements visibility, delay, retention,
//! FIFO groups and dead-lettering.

pub mod error;
pub mod queue;
pub mod record;
pub mod traits;
pub mod types;

pub use error::{EntityKind, Error, InvalidArgumentError};
pub use queue::{
    DeadLetter, Delivery, Ledger, MessageCounts, MessageId, QueueOptions, ReceiptHandle,
    ReceiveOutcome, SendOptions, receive_params,
};
pub use record::{
    Cursor, DEFAULT_MAX_CAS_ATTEMPTS, FieldMutation, FieldValue, Filter, Number, Page, Query,
    Record, SortDirection, Version, Versioned, apply_with_cas, paginate,
};
pub use traits::{CasOutcome, Queue, QueueManager, QueueMessage, RecordStore, VersionedStore};
pub use types::{BackendUrl, QueueName, RecordId};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
