//! File-backed message queues.
//!
//! Each queue is a directory holding `queue.json` (options and message
//! ledger) next to its lock file. Every operation locks the queue, loads
//! the ledger, applies the change and writes it back. Receivers long-poll by
//! re-reading the queue at a fixed interval until the wait runs out.

use std::ops::Add;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use depot_core::error::Error;
use depot_core::queue::{DeadLetter, Delivery, Ledger, MessageCounts, receive_params};
use depot_core::traits::{Queue, QueueManager, QueueMessage};
use depot_core::{MessageId, QueueName, QueueOptions, ReceiptHandle, Result, SendOptions};

use crate::store::FileStore;

/// How often a waiting receiver re-checks its queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
struct UnixMillis(i64);

impl UnixMillis {
    fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }
}

impl Add<Duration> for UnixMillis {
    type Output = UnixMillis;

    fn add(self, rhs: Duration) -> UnixMillis {
        let millis = i64::try_from(rhs.as_millis()).unwrap_or(i64::MAX);
        UnixMillis(self.0.saturating_add(millis))
    }
}

/// On-disk form of a queue.
#[derive(Debug, Serialize, Deserialize)]
struct QueueFile {
    /// Distinguishes this queue from earlier queues of the same name.
    incarnation: String,
    name: QueueName,
    created_at: DateTime<Utc>,
    options: QueueOptions,
    ledger: Ledger<UnixMillis>,
}

/// Registry of file-backed queues.
#[derive(Debug, Clone)]
pub struct FileQueueManager {
    store: FileStore,
    poll_interval: Duration,
}

impl FileQueueManager {
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override how often long-polling receivers re-check their queue.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn handle(&self, file: &QueueFile) -> FileQueue {
        FileQueue {
            store: self.store.clone(),
            name: file.name.clone(),
            incarnation: file.incarnation.clone(),
            options: file.options.clone(),
            poll_interval: self.poll_interval,
        }
    }

    fn load(&self, name: &QueueName) -> Result<Option<QueueFile>> {
        self.store.read_json(&self.store.queue_path(name))
    }
}

#[async_trait]
impl QueueManager for FileQueueManager {
    type Queue = FileQueue;

    #[instrument(skip(self, options))]
    async fn create_queue(&self, name: &QueueName, options: QueueOptions) -> Result<FileQueue> {
        options.validate()?;
        let options = options.for_queue(name);

        let _registry = self.store.lock(&self.store.registry_lock_path())?;
        if let Some(existing) = self.load(name)? {
            return Ok(self.handle(&existing));
        }

        if let Some((target, _)) = options.redrive()
            && self.load(target)?.is_none()
        {
            return Err(Error::queue_not_found(target.as_str()));
        }

        let file = QueueFile {
            incarnation: Uuid::new_v4().to_string(),
            name: name.clone(),
            created_at: Utc::now(),
            options,
            ledger: Ledger::new(),
        };
        let _lock = self.store.lock(&self.store.queue_lock_path(name))?;
        self.store.write_json(&self.store.queue_path(name), &file)?;
        debug!(path = %self.store.queue_dir(name).display(), "Created queue");

        Ok(self.handle(&file))
    }

    async fn get_queue(&self, name: &QueueName) -> Result<FileQueue> {
        let file = self
            .load(name)?
            .ok_or_else(|| Error::queue_not_found(name.as_str()))?;
        Ok(self.handle(&file))
    }

    #[instrument(skip(self))]
    async fn delete_queue(&self, name: &QueueName) -> Result<()> {
        let _registry = self.store.lock(&self.store.registry_lock_path())?;
        if self.load(name)?.is_none() {
            return Err(Error::queue_not_found(name.as_str()));
        }
        let lock = self.store.lock(&self.store.queue_lock_path(name))?;
        self.store.remove_dir(&self.store.queue_dir(name))?;
        drop(lock);
        debug!("Deleted queue");
        Ok(())
    }

    async fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<QueueName>> {
        let mut names = Vec::new();
        for dir in self.store.subdirectories(&self.store.queues_dir())? {
            if prefix.is_some_and(|p| !dir.starts_with(p)) {
                continue;
            }
            let Ok(name) = QueueName::new(dir) else {
                continue;
            };
            if self.store.queue_path(&name).exists() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Handle to a file-backed queue.
#[derive(Debug, Clone)]
pub struct FileQueue {
    store: FileStore,
    name: QueueName,
    incarnation: String,
    options: QueueOptions,
    poll_interval: Duration,
}

impl FileQueue {
    /// Read this handle's queue file, failing if the queue was deleted.
    fn load(&self) -> Result<QueueFile> {
        self.store
            .read_json::<QueueFile>(&self.store.queue_path(&self.name))?
            .filter(|file| file.incarnation == self.incarnation)
            .ok_or_else(|| Error::queue_not_found(self.name.as_str()))
    }

    /// Lock the queue and run `f` against its ledger, saving the ledger
    /// afterwards if `f` succeeds.
    fn with_ledger<R>(
        &self,
        f: impl FnOnce(&mut Ledger<UnixMillis>, &QueueOptions) -> Result<R>,
    ) -> Result<R> {
        self.modify_ledger(|ledger, options| Ok((f(ledger, options)?, true)))
    }

    /// Like [`with_ledger`](Self::with_ledger), but `f` also reports whether
    /// it changed the ledger. Unchanged ledgers are not written back.
    fn modify_ledger<R>(
        &self,
        f: impl FnOnce(&mut Ledger<UnixMillis>, &QueueOptions) -> Result<(R, bool)>,
    ) -> Result<R> {
        // Locking would recreate the directory of a deleted queue.
        if !self.store.queue_dir(&self.name).exists() {
            return Err(Error::queue_not_found(self.name.as_str()));
        }
        let _lock = self.store.lock(&self.store.queue_lock_path(&self.name))?;
        let mut file = self.load()?;
        let (result, changed) = f(&mut file.ledger, &file.options)?;
        if changed {
            self.store.write_json(&self.store.queue_path(&self.name), &file)?;
        }
        Ok(result)
    }

    /// Options to receive with: redrive is dropped when the dead-letter
    /// queue has gone away.
    fn receive_options(&self) -> QueueOptions {
        match self.options.redrive() {
            Some((target, _)) if !self.store.queue_path(target).exists() => {
                warn!(
                    queue = %self.name,
                    dead_letter_queue = %target,
                    "Dead-letter queue no longer exists, delivering normally"
                );
                QueueOptions {
                    dead_letter_queue: None,
                    ..self.options.clone()
                }
            }
            _ => self.options.clone(),
        }
    }

    /// One non-blocking receive pass.
    fn try_receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let options = self.receive_options();
        let outcome = self.modify_ledger(|ledger, _| {
            let outcome = ledger.receive(UnixMillis::now(), max, &options);
            let changed = outcome.changed();
            Ok((outcome, changed))
        })?;
        if !outcome.dead_lettered.is_empty() {
            self.forward(outcome.dead_lettered)?;
        }
        Ok(outcome.delivered)
    }

    /// Move dead letters into the dead-letter queue. They go back into this
    /// queue if the dead-letter queue vanished or could not be written.
    fn forward(&self, letters: Vec<DeadLetter>) -> Result<()> {
        let Some((target, _)) = self.options.redrive() else {
            return Ok(());
        };

        match self.append_dead_letters(target, &letters) {
            Ok(true) => return Ok(()),
            Ok(false) => warn!(
                queue = %self.name,
                dead_letter_queue = %target,
                count = letters.len(),
                "Dead-letter queue vanished, returning messages to queue"
            ),
            Err(err) => warn!(
                queue = %self.name,
                dead_letter_queue = %target,
                count = letters.len(),
                error = %err,
                "Could not write dead-letter queue, returning messages to queue"
            ),
        }

        self.with_ledger(|ledger, options| {
            let now = UnixMillis::now();
            for letter in letters {
                ledger.accept_dead_letter(letter, options, now);
            }
            Ok(())
        })
    }

    /// Append letters to `target`'s ledger. Returns false if `target` is gone.
    fn append_dead_letters(&self, target: &QueueName, letters: &[DeadLetter]) -> Result<bool> {
        if !self.store.queue_dir(target).exists() {
            return Ok(false);
        }
        let _lock = self.store.lock(&self.store.queue_lock_path(target))?;
        let path = self.store.queue_path(target);
        let Some(mut file) = self.store.read_json::<QueueFile>(&path)? else {
            return Ok(false);
        };

        let now = UnixMillis::now();
        for letter in letters {
            debug!(
                id = %letter.id,
                receive_count = letter.receive_count,
                dead_letter_queue = %target,
                "Moved message to dead-letter queue"
            );
            file.ledger.accept_dead_letter(letter.clone(), &file.options, now);
        }
        self.store.write_json(&path, &file)?;
        Ok(true)
    }

    fn message(&self, delivery: Delivery) -> FileMessage {
        FileMessage {
            delivery,
            queue: self.clone(),
        }
    }
}

#[async_trait]
impl Queue for FileQueue {
    type Message = FileMessage;

    fn name(&self) -> &QueueName {
        &self.name
    }

    fn options(&self) -> &QueueOptions {
        &self.options
    }

    #[instrument(skip(self, body, options), fields(queue = %self.name))]
    async fn send_message_with(&self, body: Value, options: SendOptions) -> Result<MessageId> {
        let id = self.with_ledger(|ledger, queue_options| {
            ledger.enqueue(body, &options, queue_options, UnixMillis::now())
        })?;
        debug!(%id, "Sent message");
        Ok(id)
    }

    #[instrument(skip(self), fields(queue = %self.name))]
    async fn receive_messages(
        &self,
        max: Option<usize>,
        wait: Option<Duration>,
    ) -> Result<Vec<FileMessage>> {
        let (max, wait) = receive_params(max, wait, &self.options)?;
        let deadline = Instant::now() + wait;

        loop {
            let delivered = self.try_receive(max)?;
            if !delivered.is_empty() {
                debug!(count = delivered.len(), "Received messages");
                return Ok(delivered.into_iter().map(|d| self.message(d)).collect());
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn delete(&self) -> Result<()> {
        let _registry = self.store.lock(&self.store.registry_lock_path())?;
        self.load()?;
        let lock = self.store.lock(&self.store.queue_lock_path(&self.name))?;
        self.store.remove_dir(&self.store.queue_dir(&self.name))?;
        drop(lock);
        debug!(queue = %self.name, "Deleted queue");
        Ok(())
    }

    async fn approximate_count(&self) -> Result<MessageCounts> {
        self.modify_ledger(|ledger, _| {
            let now = UnixMillis::now();
            let expired = ledger.expire(now);
            Ok((ledger.counts(now), expired > 0))
        })
    }

    #[instrument(skip(self), fields(queue = %self.name))]
    async fn purge(&self) -> Result<usize> {
        let removed = self.with_ledger(|ledger, _| Ok(ledger.purge()))?;
        debug!(removed, "Purged queue");
        Ok(removed)
    }
}

/// A message received from a [`FileQueue`].
#[derive(Debug)]
pub struct FileMessage {
    delivery: Delivery,
    queue: FileQueue,
}

#[async_trait]
impl QueueMessage for FileMessage {
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
        self.queue.with_ledger(|ledger, _| {
            ledger.acknowledge(&self.delivery.id, &self.delivery.receipt)
        })?;
        debug!(id = %self.delivery.id, queue = %self.queue.name, "Deleted message");
        Ok(())
    }

    async fn change_visibility(&self, timeout: Duration) -> Result<()> {
        self.queue.with_ledger(|ledger, _| {
            ledger.change_visibility(
                &self.delivery.id,
                &self.delivery.receipt,
                timeout,
                UnixMillis::now(),
            )
        })
    }
}
