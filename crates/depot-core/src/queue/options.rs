//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidArgumentError};
use crate::types::QueueName;

pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 43_200;
pub const DEFAULT_RETENTION_SECS: u64 = 345_600;
pub const MIN_RETENTION_SECS: u64 = 60;
pub const MAX_RETENTION_SECS: u64 = 1_209_600;
pub const MAX_DELAY_SECS: u64 = 900;
pub const MAX_WAIT_TIME_SECS: u64 = 20;

/// Per-queue settings.
///
/// Every field is optional; absent fields take the defaults documented on
/// the accessor methods.
///
/// ```
/// use depot_core::QueueOptions;
/// use std::time::Duration;
///
/// let options = QueueOptions {
///     visibility_timeout_seconds: Some(10),
///     fifo: Some(true),
///     ..Default::default()
/// };
/// assert_eq!(options.visibility_timeout(), Duration::from_secs(10));
/// assert!(options.is_fifo());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_retention_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_queue: Option<QueueName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_receive_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_message_wait_time_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo: Option<bool>,
}

fn out_of_range(option: &'static str, reason: String) -> Error {
    InvalidArgumentError::QueueOption { option, reason }.into()
}

fn check_max(option: &'static str, value: Option<u64>, max: u64) -> Result<(), Error> {
    match value {
        Some(v) if v > max => Err(out_of_range(option, format!("{} exceeds maximum {}", v, max))),
        _ => Ok(()),
    }
}

impl QueueOptions {
    /// Check every present option against its allowed range.
    pub fn validate(&self) -> Result<(), Error> {
        check_max("delaySeconds", self.delay_seconds, MAX_DELAY_SECS)?;
        check_max(
            "visibilityTimeoutSeconds",
            self.visibility_timeout_seconds,
            MAX_VISIBILITY_TIMEOUT_SECS,
        )?;
        check_max(
            "receiveMessageWaitTimeSeconds",
            self.receive_message_wait_time_seconds,
            MAX_WAIT_TIME_SECS,
        )?;

        if let Some(retention) = self.message_retention_seconds
            && !(MIN_RETENTION_SECS..=MAX_RETENTION_SECS).contains(&retention)
        {
            return Err(out_of_range(
                "messageRetentionSeconds",
                format!(
                    "{} is outside {}..={}",
                    retention, MIN_RETENTION_SECS, MAX_RETENTION_SECS
                ),
            ));
        }

        if self.max_receive_count == Some(0) {
            return Err(out_of_range(
                "maxReceiveCount",
                "must be at least 1".to_string(),
            ));
        }

        if self.dead_letter_queue.is_some() && self.max_receive_count.is_none() {
            return Err(out_of_range(
                "maxReceiveCount",
                "required when a dead-letter queue is configured".to_string(),
            ));
        }

        Ok(())
    }

    /// Default delay for new messages (0 s).
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds.unwrap_or(0))
    }

    /// How long messages are kept before being discarded (4 days).
    pub fn retention(&self) -> Duration {
        Duration::from_secs(
            self.message_retention_seconds
                .unwrap_or(DEFAULT_RETENTION_SECS),
        )
    }

    /// Lease granted to a receiver (30 s).
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(
            self.visibility_timeout_seconds
                .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS),
        )
    }

    /// Long-poll wait used when a receive call passes none (0 s).
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.receive_message_wait_time_seconds.unwrap_or(0))
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted.unwrap_or(false)
    }

    pub fn is_fifo(&self) -> bool {
        self.fifo.unwrap_or(false)
    }

    /// Settings for a queue called `name`. A `.fifo` name turns on FIFO
    /// ordering unless `fifo` is set explicitly.
    pub fn for_queue(mut self, name: &QueueName) -> Self {
        if self.fifo.is_none() && name.has_fifo_suffix() {
            self.fifo = Some(true);
        }
        self
    }

    /// The dead-letter target and the receive count that triggers it, when
    /// both are configured.
    pub fn redrive(&self) -> Option<(&QueueName, u32)> {
        match (&self.dead_letter_queue, self.max_receive_count) {
            (Some(target), Some(max)) => Some((target, max)),
            _ => None,
        }
    }
}
