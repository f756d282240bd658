//! Task queue contract and best-effort notification.
//!
//! The control plane asks builders/workers to act by enqueueing tasks.
//! Delivery is the queue's concern; this module only defines the send
//! contract, an in-process channel implementation, and a `Notifier` that
//! bounds each send with a timeout and logs (never propagates) failures.

use std::sync::Arc;
use std::time::Duration;

use appgrid_core::config::QueueConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Task asking the gateway worker to re-apply a component's port rules.
pub const TASK_APPLY_RULE: &str = "apply_rule";

/// A task as handed to the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub topic: String,
    pub task_type: String,
    pub body: serde_json::Value,
}

/// Message queue client.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn send(&self, topic: &str, task_type: &str, body: serde_json::Value)
    -> anyhow::Result<()>;
}

/// In-process queue backed by a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelQueue {
    tx: mpsc::Sender<Task>,
}

impl ChannelQueue {
    /// Create the queue and the receiving end a consumer drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskQueue for ChannelQueue {
    async fn send(
        &self,
        topic: &str,
        task_type: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<()> {
        let task = Task {
            topic: topic.to_string(),
            task_type: task_type.to_string(),
            body,
        };
        self.tx
            .send(task)
            .await
            .map_err(|_| anyhow::anyhow!("task queue closed"))
    }
}

/// Sends tasks after a commit. A lost notification does not undo the commit.
#[derive(Clone)]
pub struct Notifier {
    queue: Arc<dyn TaskQueue>,
    topic: String,
    timeout: Duration,
}

impl Notifier {
    pub fn new(queue: Arc<dyn TaskQueue>, config: &QueueConfig) -> Self {
        Self {
            queue,
            topic: config.worker_topic.clone(),
            timeout: config.send_timeout(),
        }
    }

    /// Override the per-send timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enqueue a task. Returns whether it was accepted.
    pub async fn notify(&self, task_type: &str, body: serde_json::Value) -> bool {
        match tokio::time::timeout(self.timeout, self.queue.send(&self.topic, task_type, body))
            .await
        {
            Ok(Ok(())) => {
                debug!(topic = %self.topic, task_type, "task enqueued");
                true
            }
            Ok(Err(e)) => {
                warn!(topic = %self.topic, task_type, error = %e, "failed to enqueue task");
                false
            }
            Err(_) => {
                warn!(
                    topic = %self.topic,
                    task_type,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "enqueue timed out"
                );
                false
            }
        }
    }
}
