//! Queue behavior of the file-backed adapter.
//!
//! The file adapter keeps wall-clock timestamps, so these tests use zero or
//! sub-second timings instead of a paused clock.

use std::time::Duration;

use depot_core::{
    Error, InvalidArgumentError, Queue, QueueManager, QueueMessage, QueueName, QueueOptions,
    SendOptions,
};
use depot_file::{FileQueue, FileQueueManager, FileStore};
use serde_json::json;
use tempfile::TempDir;

fn name(s: &str) -> QueueName {
    QueueName::new(s).unwrap()
}

fn manager(dir: &TempDir) -> FileQueueManager {
    FileQueueManager::new(FileStore::new(dir.path()))
        .with_poll_interval(Duration::from_millis(20))
}

async fn queue_with(dir: &TempDir, queue: &str, options: QueueOptions) -> FileQueue {
    manager(dir).create_queue(&name(queue), options).await.unwrap()
}

#[tokio::test]
async fn test_messages_survive_reopening() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(&dir, "jobs", QueueOptions::default()).await;
    queue.send_message(json!({"task": 1})).await.unwrap();

    let reopened = manager(&dir).get_queue(&name("jobs")).await.unwrap();
    let received = reopened.receive_messages(None, None).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body(), &json!({"task": 1}));
    received[0].delete().await.unwrap();

    assert_eq!(queue.approximate_count().await.unwrap(), Default::default());
}

#[tokio::test]
async fn test_lifecycle() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    for queue in ["beta", "alpha", "alpine"] {
        manager
            .create_queue(&name(queue), QueueOptions::default())
            .await
            .unwrap();
    }

    assert_eq!(
        manager.list_queues(None).await.unwrap(),
        vec![name("alpha"), name("alpine"), name("beta")]
    );
    assert_eq!(
        manager.list_queues(Some("alp")).await.unwrap(),
        vec![name("alpha"), name("alpine")]
    );

    let beta = manager.get_queue(&name("beta")).await.unwrap();
    manager.delete_queue(&name("beta")).await.unwrap();
    assert!(beta.send_message(json!(1)).await.unwrap_err().is_not_found());
    assert!(manager.get_queue(&name("beta")).await.unwrap_err().is_not_found());
    assert!(!dir.path().join("queues/beta").exists());

    // Recreating the name does not revive old handles.
    manager
        .create_queue(&name("beta"), QueueOptions::default())
        .await
        .unwrap();
    assert!(beta.purge().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_create_is_idempotent_and_validated() {
    let dir = TempDir::new().unwrap();
    let first = queue_with(
        &dir,
        "jobs",
        QueueOptions {
            visibility_timeout_seconds: Some(5),
            ..Default::default()
        },
    )
    .await;
    let second = queue_with(&dir, "jobs", QueueOptions::default()).await;
    assert_eq!(first.options(), second.options());

    let err = manager(&dir)
        .create_queue(
            &name("bad"),
            QueueOptions {
                receive_message_wait_time_seconds: Some(60),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidArgument(InvalidArgumentError::QueueOption { .. })
    ));
}

#[tokio::test]
async fn test_visibility_and_stale_receipts() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(&dir, "jobs", QueueOptions::default()).await;
    queue.send_message(json!("work")).await.unwrap();

    let first = queue.receive_messages(None, None).await.unwrap().remove(0);
    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());

    first.change_visibility(Duration::ZERO).await.unwrap();
    let second = queue.receive_messages(None, None).await.unwrap().remove(0);
    assert_eq!(second.receive_count(), 2);

    let err = first.delete().await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidArgument(InvalidArgumentError::StaleReceipt { .. })
    ));
    second.delete().await.unwrap();
    second.delete().await.unwrap();
}

#[tokio::test]
async fn test_long_poll_sees_message_from_another_handle() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(&dir, "jobs", QueueOptions::default()).await;
    let sender = manager(&dir).get_queue(&name("jobs")).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        sender.send_message(json!("hello")).await.unwrap();
    });

    let received = queue
        .receive_messages(Some(1), Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body(), &json!("hello"));
}

#[tokio::test]
async fn test_delayed_message() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(&dir, "later", QueueOptions::default()).await;
    queue
        .send_message_with(
            json!("soon"),
            SendOptions {
                delay: Some(Duration::from_millis(200)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(queue.approximate_count().await.unwrap().delayed, 1);
    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());

    let received = queue
        .receive_messages(None, Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_dead_letter_queue() {
    let dir = TempDir::new().unwrap();
    let dlq = queue_with(&dir, "jobs-dlq", QueueOptions::default()).await;
    let queue = queue_with(
        &dir,
        "jobs",
        QueueOptions {
            visibility_timeout_seconds: Some(0),
            dead_letter_queue: Some(name("jobs-dlq")),
            max_receive_count: Some(2),
            ..Default::default()
        },
    )
    .await;
    queue.send_message(json!("poison")).await.unwrap();

    assert_eq!(queue.receive_messages(None, None).await.unwrap().len(), 1);
    assert_eq!(queue.receive_messages(None, None).await.unwrap().len(), 1);
    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());

    let dead = dlq.receive_messages(None, None).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].body(), &json!("poison"));
}

#[tokio::test]
async fn test_dead_letter_queue_must_exist() {
    let dir = TempDir::new().unwrap();
    let err = manager(&dir)
        .create_queue(
            &name("jobs"),
            QueueOptions {
                dead_letter_queue: Some(name("missing")),
                max_receive_count: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_fifo_ordering_and_deduplication() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(
        &dir,
        "orders.fifo",
        QueueOptions {
            fifo: Some(true),
            ..Default::default()
        },
    )
    .await;

    for n in 1..=3 {
        let send = SendOptions {
            group_id: Some("customer-1".to_string()),
            deduplication_id: Some(format!("order-{}", n)),
            ..Default::default()
        };
        queue.send_message_with(json!(n), send.clone()).await.unwrap();
        // Duplicate sends are absorbed.
        queue.send_message_with(json!(n), send).await.unwrap();
    }

    let mut order = Vec::new();
    for _ in 0..3 {
        let batch = queue.receive_messages(Some(10), None).await.unwrap();
        assert_eq!(batch.len(), 1, "one message per group at a time");
        order.push(batch[0].body().clone());
        batch[0].delete().await.unwrap();
    }
    assert_eq!(order, vec![json!(1), json!(2), json!(3)]);
    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purge() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(&dir, "jobs", QueueOptions::default()).await;
    for n in 0..3 {
        queue.send_message(json!(n)).await.unwrap();
    }

    assert_eq!(queue.purge().await.unwrap(), 3);
    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unwritable_dead_letter_queue_keeps_messages() {
    let dir = TempDir::new().unwrap();
    queue_with(&dir, "jobs-dlq", QueueOptions::default()).await;
    let queue = queue_with(
        &dir,
        "jobs",
        QueueOptions {
            visibility_timeout_seconds: Some(0),
            dead_letter_queue: Some(name("jobs-dlq")),
            max_receive_count: Some(1),
            ..Default::default()
        },
    )
    .await;
    queue.send_message(json!("poison")).await.unwrap();
    assert_eq!(queue.receive_messages(None, None).await.unwrap().len(), 1);

    let dlq_path = dir.path().join("queues").join("jobs-dlq").join("queue.json");
    std::fs::write(&dlq_path, "not json").unwrap();

    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());
    assert_eq!(queue.approximate_count().await.unwrap().visible, 1);
    let again = queue.receive_messages(None, None).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].body(), &json!("poison"));
}

#[tokio::test]
async fn test_idle_receive_leaves_queue_file_alone() {
    let dir = TempDir::new().unwrap();
    let queue = queue_with(&dir, "jobs", QueueOptions::default()).await;
    let path = dir.path().join("queues").join("jobs").join("queue.json");
    let before = std::fs::metadata(&path).unwrap().modified().unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(queue.receive_messages(None, None).await.unwrap().is_empty());
    queue.approximate_count().await.unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
}
