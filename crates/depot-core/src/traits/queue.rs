//! Message queue traits.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;
use crate::queue::{MessageCounts, MessageId, QueueOptions, ReceiptHandle, SendOptions};
use crate::types::QueueName;

/// Registry of named queues.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Queue handle type for this backend.
    type Queue: Queue;

    /// Create a queue, or return the existing one with that name.
    ///
    /// Options are validated even when the queue already exists, but are
    /// only applied on first creation.
    async fn create_queue(&self, name: &QueueName, options: QueueOptions) -> Result<Self::Queue>;

    /// Open an existing queue. Fails with `NotFound` if missing.
    async fn get_queue(&self, name: &QueueName) -> Result<Self::Queue>;

    /// Destroy a queue and every message in it.
    async fn delete_queue(&self, name: &QueueName) -> Result<()>;

    /// Queue names sorted ascending, optionally restricted to a prefix.
    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<QueueName>>;
}

/// Handle to a single queue.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Message type returned by receives.
    type Message: QueueMessage;

    fn name(&self) -> &QueueName;

    /// Options the queue was created with.
    fn options(&self) -> &QueueOptions;

    async fn send_message(&self, body: Value) -> Result<MessageId> {
        self.send_message_with(body, SendOptions::default()).await
    }

    /// Send with a per-message delay, FIFO group or deduplication id.
    async fn send_message_with(&self, body: Value, options: SendOptions) -> Result<MessageId>;

    /// Serialize `body` and send it.
    async fn send<T>(&self, body: &T) -> Result<MessageId>
    where
        T: Serialize + Sync,
        Self: Sized,
    {
        let value = serde_json::to_value(body)?;
        self.send_message(value).await
    }

    /// Receive up to `max` messages (default 1), waiting up to `wait`
    /// (default: the queue's `receiveMessageWaitTimeSeconds`) for the
    /// first. Returns an empty vector on timeout.
    async fn receive_messages(
        &self,
        max: Option<usize>,
        wait: Option<Duration>,
    ) -> Result<Vec<Self::Message>>;

    /// Destroy this queue.
    async fn delete(&self) -> Result<()>;

    async fn approximate_count(&self) -> Result<MessageCounts>;

    /// Remove every message, returning how many were removed.
    async fn purge(&self) -> Result<usize>;
}

/// A received message bound to its receipt handle.
#[async_trait]
pub trait QueueMessage: Send + Sync {
    fn id(&self) -> &MessageId;

    fn body(&self) -> &Value;

    fn receipt(&self) -> &ReceiptHandle;

    /// Deliveries so far, including this one.
    fn receive_count(&self) -> u32;

    fn group_id(&self) -> Option<&str>;

    /// Deserialize the body.
    fn body_as<T: DeserializeOwned>(&self) -> Result<T>
    where
        Self: Sized,
    {
        Ok(serde_json::from_value(self.body().clone())?)
    }

    /// Acknowledge the message, removing it from its queue.
    async fn delete(&self) -> Result<()>;

    /// Hide the message for `timeout` from now.
    async fn change_visibility(&self, timeout: Duration) -> Result<()>;
}
