//! In-memory message queues.
//!
//! A [`MemoryQueueManager`] owns a registry of queues. Queue handles share
//! that registry so they can reach their dead-letter queue, and each
//! queue's ledger sits behind an async mutex paired with a [`Notify`] that
//! wakes long-polling receivers when messages arrive.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use depot_core::error::Error;
use depot_core::queue::{DeadLetter, Delivery, Ledger, MessageCounts, receive_params};
use depot_core::traits::{Queue, QueueManager, QueueMessage};
use depot_core::{MessageId, QueueName, QueueOptions, ReceiptHandle, Result, SendOptions};

type Registry = Arc<RwLock<BTreeMap<QueueName, Arc<QueueState>>>>;

#[derive(Debug)]
struct QueueState {
    name: QueueName,
    options: QueueOptions,
    ledger: Mutex<Ledger<Instant>>,
    arrivals: Notify,
    deleted: AtomicBool,
}

impl QueueState {
    fn new(name: QueueName, options: QueueOptions) -> Self {
        Self {
            name,
            options,
            ledger: Mutex::new(Ledger::new()),
            arrivals: Notify::new(),
            deleted: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.deleted.load(Ordering::Acquire) {
            Err(Error::queue_not_found(self.name.as_str()))
        } else {
            Ok(())
        }
    }

    /// Flag the queue as deleted. Holding the ledger lock orders this
    /// against dead letters being forwarded in.
    async fn mark_deleted(&self) {
        let _ledger = self.ledger.lock().await;
        self.deleted.store(true, Ordering::Release);
        self.arrivals.notify_waiters();
    }
}

/// Registry of in-memory queues.
///
/// Cloning the manager shares the registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueManager {
    registry: Registry,
}

impl MemoryQueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, state: Arc<QueueState>) -> MemoryQueue {
        MemoryQueue {
            state,
            registry: Arc::clone(&self.registry),
        }
    }
}

#[async_trait]
impl QueueManager for MemoryQueueManager {
    type Queue = MemoryQueue;

    #[instrument(skip(self, options))]
    async fn create_queue(&self, name: &QueueName, options: QueueOptions) -> Result<MemoryQueue> {
        options.validate()?;
        let options = options.for_queue(name);

        let mut registry = self.registry.write().await;
        if let Some(existing) = registry.get(name) {
            return Ok(self.handle(Arc::clone(existing)));
        }

        if let Some((target, _)) = options.redrive()
            && !registry.contains_key(target)
        {
            return Err(Error::queue_not_found(target.as_str()));
        }

        let state = Arc::new(QueueState::new(name.clone(), options));
        registry.insert(name.clone(), Arc::clone(&state));
        debug!("Created queue");
        Ok(self.handle(state))
    }

    async fn get_queue(&self, name: &QueueName) -> Result<MemoryQueue> {
        let registry = self.registry.read().await;
        let state = registry
            .get(name)
            .ok_or_else(|| Error::queue_not_found(name.as_str()))?;
        Ok(self.handle(Arc::clone(state)))
    }

    #[instrument(skip(self))]
    async fn delete_queue(&self, name: &QueueName) -> Result<()> {
        let state = self
            .registry
            .write()
            .await
            .remove(name)
            .ok_or_else(|| Error::queue_not_found(name.as_str()))?;
        state.mark_deleted().await;
        debug!("Deleted queue");
        Ok(())
    }

    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<QueueName>> {
        let registry = self.registry.read().await;
        Ok(registry
            .keys()
            .filter(|name| prefix.is_none_or(|p| name.as_str().starts_with(p)))
            .cloned()
            .collect())
    }
}

/// Handle to an in-memory queue.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    state: Arc<QueueState>,
    registry: Registry,
}

impl MemoryQueue {
    /// The dead-letter queue, if one is configured and still exists.
    async fn dead_letter_target(&self) -> Option<Arc<QueueState>> {
        let (target, _) = self.state.options.redrive()?;
        let found = self.registry.read().await.get(target).cloned();
        if found.is_none() {
            warn!(
                queue = %self.state.name,
                dead_letter_queue = %target,
                "Dead-letter queue no longer exists, delivering normally"
            );
        }
        found
    }

    /// Move dead letters into `target`, or back into this queue if `target`
    /// was deleted after it was looked up.
    async fn forward(&self, target: &QueueState, letters: Vec<DeadLetter>) {
        if letters.is_empty() {
            return;
        }
        let now = Instant::now();
        let mut ledger = target.ledger.lock().await;
        if target.deleted.load(Ordering::Acquire) {
            drop(ledger);
            warn!(
                queue = %self.state.name,
                dead_letter_queue = %target.name,
                count = letters.len(),
                "Dead-letter queue was deleted, returning messages to queue"
            );
            let mut ledger = self.state.ledger.lock().await;
            for letter in letters {
                ledger.accept_dead_letter(letter, &self.state.options, now);
            }
            drop(ledger);
            self.state.arrivals.notify_waiters();
            return;
        }
        for letter in letters {
            debug!(
                id = %letter.id,
                receive_count = letter.receive_count,
                dead_letter_queue = %target.name,
                "Moved message to dead-letter queue"
            );
            ledger.accept_dead_letter(letter, &target.options, now);
        }
        drop(ledger);
        target.arrivals.notify_waiters();
    }

    fn message(&self, delivery: Delivery) -> MemoryMessage {
        MemoryMessage {
            delivery,
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    type Message = MemoryMessage;

    fn name(&self) -> &QueueName {
        &self.state.name
    }

    fn options(&self) -> &QueueOptions {
        &self.state.options
    }

    #[instrument(skip(self, body, options), fields(queue = %self.state.name))]
    async fn send_message_with(&self, body: Value, options: SendOptions) -> Result<MessageId> {
        self.state.ensure_live()?;
        let id = self.state.ledger.lock().await.enqueue(
            body,
            &options,
            &self.state.options,
            Instant::now(),
        )?;
        self.state.arrivals.notify_waiters();
        debug!(%id, "Sent message");
        Ok(id)
    }

    #[instrument(skip(self), fields(queue = %self.state.name))]
    async fn receive_messages(
        &self,
        max: Option<usize>,
        wait: Option<Duration>,
    ) -> Result<Vec<MemoryMessage>> {
        let (max, wait) = receive_params(max, wait, &self.state.options)?;
        let deadline = Instant::now() + wait;

        loop {
            let mut notified = std::pin::pin!(self.state.arrivals.notified());
            notified.as_mut().enable();

            self.state.ensure_live()?;

            let target = self.dead_letter_target().await;
            let options = match &target {
                Some(_) => self.state.options.clone(),
                None => QueueOptions {
                    dead_letter_queue: None,
                    ..self.state.options.clone()
                },
            };

            let now = Instant::now();
            let (outcome, next_visible) = {
                let mut ledger = self.state.ledger.lock().await;
                let outcome = ledger.receive(now, max, &options);
                (outcome, ledger.next_visible_at(now))
            };

            if let Some(target) = &target {
                self.forward(target, outcome.dead_lettered).await;
            }

            if !outcome.delivered.is_empty() {
                debug!(count = outcome.delivered.len(), "Received messages");
                return Ok(outcome
                    .delivered
                    .into_iter()
                    .map(|d| self.message(d))
                    .collect());
            }

            if now >= deadline {
                return Ok(Vec::new());
            }

            let wake = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn delete(&self) -> Result<()> {
        self.state.ensure_live()?;
        let mut registry = self.registry.write().await;
        if registry
            .get(&self.state.name)
            .is_some_and(|current| Arc::ptr_eq(current, &self.state))
        {
            registry.remove(&self.state.name);
        }
        drop(registry);
        self.state.mark_deleted().await;
        debug!(queue = %self.state.name, "Deleted queue");
        Ok(())
    }

    async fn approximate_count(&self) -> Result<MessageCounts> {
        self.state.ensure_live()?;
        let now = Instant::now();
        let mut ledger = self.state.ledger.lock().await;
        ledger.expire(now);
        Ok(ledger.counts(now))
    }

    #[instrument(skip(self), fields(queue = %self.state.name))]
    async fn purge(&self) -> Result<usize> {
        self.state.ensure_live()?;
        let removed = self.state.ledger.lock().await.purge();
        debug!(removed, "Purged queue");
        Ok(removed)
    }
}

/// A message received from a [`MemoryQueue`].
#[derive(Debug)]
pub struct MemoryMessage {
    delivery: Delivery,
    state: Arc<QueueState>,
}

#[async_trait]
impl QueueMessage for MemoryMessage {
    fn id(&self) -> &MessageId {
        &self.delivery.id
    }

    fn body(&self) -> &Value {
        &self.delivery.body
    }

    fn receipt(&self) -> &ReceiptHandle {
        &self.delivery.receipt
    }

    fn receive_count(&self) -> u32 {
        self.delivery.receive_count
    }

    fn group_id(&self) -> Option<&str> {
        self.delivery.group_id.as_deref()
    }

    async fn delete(&self) -> Result<()> {
        self.state.ensure_live()?;
        self.state
            .ledger
            .lock()
            .await
            .acknowledge(&self.delivery.id, &self.delivery.receipt)?;
        // A FIFO group may have been waiting on this message.
        self.state.arrivals.notify_waiters();
        debug!(id = %self.delivery.id, queue = %self.state.name, "Deleted message");
        Ok(())
    }

    async fn change_visibility(&self, timeout: Duration) -> Result<()> {
        self.state.ensure_live()?;
        self.state.ledger.lock().await.change_visibility(
            &self.delivery.id,
            &self.delivery.receipt,
            timeout,
            Instant::now(),
        )?;
        if timeout.is_zero() {
            self.state.arrivals.notify_waiters();
        }
        Ok(())
    }
}
