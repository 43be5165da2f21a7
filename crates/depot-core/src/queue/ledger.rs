//! Message ledger.
//!
//! [`Ledger`] is the state machine behind every queue adapter. It owns the
//! messages of one queue and decides, given the current time, which of
//! them a receive hands out, which move to the dead-letter queue, and
//! which have outlived the retention period. Adapters supply the clock and
//! the persistence; the ledger is generic over the timestamp type so the
//! in-memory adapter can use a pausable monotonic clock while the file
//! adapter stores wall-clock milliseconds.

use std::collections::{HashMap, HashSet};
use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MessageId, QueueOptions, ReceiptHandle, SendOptions};
use crate::error::{EntityKind, Error, InvalidArgumentError};

/// How long a FIFO deduplication id suppresses repeat sends.
pub const DEDUPLICATION_WINDOW: Duration = Duration::from_secs(300);

/// Group used for FIFO messages sent without a group id.
const DEFAULT_GROUP: &str = "";

/// A message at rest in a ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage<T> {
    pub id: MessageId,
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub seq: u64,
    pub visible_at: T,
    pub expires_at: T,
    pub receive_count: u32,
    /// Receipt of the latest delivery, if the message was ever delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ReceiptHandle>,
}

/// A message handed to a receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: MessageId,
    pub body: Value,
    pub receipt: ReceiptHandle,
    pub receive_count: u32,
    pub group_id: Option<String>,
}

/// A message evicted from its queue after too many deliveries.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub id: MessageId,
    pub body: Value,
    pub group_id: Option<String>,
    pub receive_count: u32,
}

/// Result of a receive pass.
#[derive(Debug, Default)]
pub struct ReceiveOutcome {
    pub delivered: Vec<Delivery>,
    /// Messages the adapter must forward to the dead-letter queue.
    pub dead_lettered: Vec<DeadLetter>,
    /// Messages dropped for outliving the retention period.
    pub expired: usize,
}

impl ReceiveOutcome {
    /// Whether the pass changed the ledger's messages.
    pub fn changed(&self) -> bool {
        self.expired > 0 || !self.delivered.is_empty() || !self.dead_lettered.is_empty()
    }
}

/// Approximate message counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessageCounts {
    /// Ready for delivery.
    pub visible: usize,
    /// Delivered and within their visibility timeout.
    pub in_flight: usize,
    /// Sent with a delay that has not yet elapsed.
    pub delayed: usize,
}

/// Messages of one queue plus the bookkeeping to deliver them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger<T> {
    messages: Vec<StoredMessage<T>>,
    next_seq: u64,
    #[serde(default)]
    dedup: HashMap<String, (MessageId, T)>,
}

impl<T> Default for Ledger<T> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            next_seq: 0,
            dedup: HashMap::new(),
        }
    }
}

impl<T> Ledger<T>
where
    T: Copy + Ord + Add<Duration, Output = T>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages held, in any state.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message.
    ///
    /// On FIFO queues a repeated deduplication id within the window returns
    /// the id of the original message without enqueueing again.
    pub fn enqueue(
        &mut self,
        body: Value,
        send: &SendOptions,
        options: &QueueOptions,
        now: T,
    ) -> Result<MessageId, Error> {
        let delay = match send.delay {
            Some(delay) if delay > Duration::from_secs(super::options::MAX_DELAY_SECS) => {
                return Err(InvalidArgumentError::QueueOption {
                    option: "delaySeconds",
                    reason: format!("{:?} exceeds maximum of 900s", delay),
                }
                .into());
            }
            Some(delay) => delay,
            None => options.delay(),
        };

        if options.is_fifo()
            && let Some(dedup_id) = &send.deduplication_id
        {
            self.dedup.retain(|_, (_, expires)| *expires > now);
            if let Some((original, _)) = self.dedup.get(dedup_id) {
                return Ok(original.clone());
            }
        }

        let id = MessageId::generate();
        self.push(id.clone(), body, send.group_id.clone(), delay, options, now);

        if options.is_fifo()
            && let Some(dedup_id) = &send.deduplication_id
        {
            self.dedup
                .insert(dedup_id.clone(), (id.clone(), now + DEDUPLICATION_WINDOW));
        }

        Ok(id)
    }

    /// Accept a message evicted from another queue.
    pub fn accept_dead_letter(&mut self, letter: DeadLetter, options: &QueueOptions, now: T) {
        self.push(
            letter.id,
            letter.body,
            letter.group_id,
            Duration::ZERO,
            options,
            now,
        );
    }

    fn push(
        &mut self,
        id: MessageId,
        body: Value,
        group_id: Option<String>,
        delay: Duration,
        options: &QueueOptions,
        now: T,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.messages.push(StoredMessage {
            id,
            body,
            group_id,
            seq,
            visible_at: now + delay,
            expires_at: now + options.retention(),
            receive_count: 0,
            receipt: None,
        });
    }

    /// Drop messages past their retention period. Returns how many went.
    pub fn expire(&mut self, now: T) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| m.expires_at > now);
        self.dedup.retain(|_, (_, expires)| *expires > now);
        before - self.messages.len()
    }

    /// Lease up to `max` visible messages.
    ///
    /// Messages are considered in send order. On FIFO queues a message group
    /// is blocked as soon as one of its messages is not visible (in flight
    /// or delayed) and a pass delivers at most one message per group, so
    /// later messages of a group never overtake earlier ones. A
    /// message that has already been delivered `maxReceiveCount` times is
    /// moved out for dead-lettering instead of being delivered again.
    pub fn receive(&mut self, now: T, max: usize, options: &QueueOptions) -> ReceiveOutcome {
        let expired = self.expire(now);

        let visibility = options.visibility_timeout();
        let fifo = options.is_fifo();
        let redrive_after = options.redrive().map(|(_, max_receives)| max_receives);

        let mut outcome = ReceiveOutcome {
            expired,
            ..ReceiveOutcome::default()
        };
        let mut blocked: HashSet<String> = HashSet::new();
        let mut evicted: Vec<usize> = Vec::new();

        for (index, message) in self.messages.iter_mut().enumerate() {
            if outcome.delivered.len() >= max {
                break;
            }

            let group = message.group_id.as_deref().unwrap_or(DEFAULT_GROUP);

            if message.visible_at > now {
                if fifo {
                    blocked.insert(group.to_string());
                }
                continue;
            }

            if fifo && blocked.contains(group) {
                continue;
            }

            if redrive_after.is_some_and(|limit| message.receive_count >= limit) {
                evicted.push(index);
                continue;
            }

            if fifo {
                blocked.insert(group.to_string());
            }

            let receipt = ReceiptHandle::generate();
            message.receive_count += 1;
            message.receipt = Some(receipt.clone());
            message.visible_at = now + visibility;

            outcome.delivered.push(Delivery {
                id: message.id.clone(),
                body: message.body.clone(),
                receipt,
                receive_count: message.receive_count,
                group_id: message.group_id.clone(),
            });
        }

        for index in evicted.into_iter().rev() {
            let message = self.messages.remove(index);
            outcome.dead_lettered.push(DeadLetter {
                id: message.id,
                body: message.body,
                group_id: message.group_id,
                receive_count: message.receive_count,
            });
        }
        outcome.dead_lettered.reverse();

        outcome
    }

    /// Earliest moment a currently hidden message becomes visible.
    pub fn next_visible_at(&self, now: T) -> Option<T> {
        self.messages
            .iter()
            .map(|m| m.visible_at)
            .filter(|at| *at > now)
            .min()
    }

    /// Delete a delivered message.
    ///
    /// Deleting a message that is already gone succeeds. Deleting with a
    /// receipt from an earlier delivery fails, since another receiver now
    /// holds the message.
    pub fn acknowledge(&mut self, id: &MessageId, receipt: &ReceiptHandle) -> Result<(), Error> {
        let Some(index) = self.messages.iter().position(|m| &m.id == id) else {
            return Ok(());
        };

        if self.messages[index].receipt.as_ref() != Some(receipt) {
            return Err(InvalidArgumentError::StaleReceipt {
                message_id: id.to_string(),
            }
            .into());
        }

        self.messages.remove(index);
        Ok(())
    }

    /// Reset the visibility timeout of a delivered message.
    pub fn change_visibility(
        &mut self,
        id: &MessageId,
        receipt: &ReceiptHandle,
        timeout: Duration,
        now: T,
    ) -> Result<(), Error> {
        if timeout > Duration::from_secs(super::options::MAX_VISIBILITY_TIMEOUT_SECS) {
            return Err(InvalidArgumentError::QueueOption {
                option: "visibilityTimeoutSeconds",
                reason: format!("{:?} exceeds maximum of 12h", timeout),
            }
            .into());
        }

        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| Error::NotFound {
                kind: EntityKind::Message,
                name: id.to_string(),
            })?;

        if message.receipt.as_ref() != Some(receipt) {
            return Err(InvalidArgumentError::StaleReceipt {
                message_id: id.to_string(),
            }
            .into());
        }

        message.visible_at = now + timeout;
        Ok(())
    }

    pub fn counts(&self, now: T) -> MessageCounts {
        let mut counts = MessageCounts::default();
        for message in &self.messages {
            if message.visible_at <= now {
                counts.visible += 1;
            } else if message.receipt.is_some() {
                counts.in_flight += 1;
            } else {
                counts.delayed += 1;
            }
        }
        counts
    }

    /// Remove every message. Returns how many were removed.
    pub fn purge(&mut self) -> usize {
        let removed = self.messages.len();
        self.messages.clear();
        removed
    }
}
