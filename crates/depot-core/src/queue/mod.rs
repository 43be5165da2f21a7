//! Queue data model and the ledger shared by queue adapters.
//!
//! The operations themselves are methods on [`QueueManager`](crate::QueueManager),
//! [`Queue`](crate::Queue) and [`QueueMessage`](crate::QueueMessage).

mod ledger;
mod options;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, InvalidArgumentError};

pub use ledger::{
    DEDUPLICATION_WINDOW, DeadLetter, Delivery, Ledger, MessageCounts, ReceiveOutcome,
    StoredMessage,
};
pub use options::{
    DEFAULT_RETENTION_SECS, DEFAULT_VISIBILITY_TIMEOUT_SECS, MAX_DELAY_SECS, MAX_RETENTION_SECS,
    MAX_VISIBILITY_TIMEOUT_SECS, MAX_WAIT_TIME_SECS, MIN_RETENTION_SECS, QueueOptions,
};

/// Identifier assigned to a message when it is sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token bound to a single delivery of a message.
///
/// Every receive of a message issues a fresh handle; only the latest one
/// can delete the message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-message send settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Overrides the queue's `delaySeconds` for this message.
    pub delay: Option<Duration>,
    /// FIFO ordering scope. Messages without one share a default group.
    pub group_id: Option<String>,
    /// FIFO duplicate suppression key.
    pub deduplication_id: Option<String>,
}

/// Messages returned by a receive when the caller passes no maximum.
pub const DEFAULT_RECEIVE_BATCH: usize = 1;

/// Resolve receive parameters against the queue's options.
///
/// Returns the batch size and the long-poll wait.
pub fn receive_params(
    max: Option<usize>,
    wait: Option<Duration>,
    options: &QueueOptions,
) -> Result<(usize, Duration), Error> {
    let max = max.unwrap_or(DEFAULT_RECEIVE_BATCH);
    if max == 0 {
        return Err(InvalidArgumentError::Other {
            message: "must ask for at least one message".to_string(),
        }
        .into());
    }

    let wait = wait.unwrap_or_else(|| options.wait_time());
    if wait > Duration::from_secs(MAX_WAIT_TIME_SECS) {
        return Err(InvalidArgumentError::QueueOption {
            option: "receiveMessageWaitTimeSeconds",
            reason: format!("{:?} exceeds maximum of {}s", wait, MAX_WAIT_TIME_SECS),
        }
        .into());
    }

    Ok((max, wait))
}
