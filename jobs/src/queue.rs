//! `DurableQueue`: a blocking FIFO of JSON job envelopes with at-least-once
//! delivery. Consumers (the worker pools) must be idempotent, since a
//! process restart redelivers anything not yet acknowledged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggingJob {
    pub chunk_id: Uuid,
    pub tenant_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystJob {
    pub document_id: String,
    pub tenant_id: String,
    pub client_id: Option<String>,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum JobKind {
    Tagging(TaggingJob),
    Analyst(AnalystJob),
}

/// JSON-envelope wrapper persisted/transmitted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub kind: JobKind,
    pub created_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("dequeue cancelled")]
    Cancelled,
}

#[async_trait]
pub trait DurableQueue: Send + Sync {
    async fn enqueue(&self, job: JobEnvelope) -> Result<(), QueueError>;
    async fn dequeue(&self, cancel: &CancellationToken) -> Result<JobEnvelope, QueueError>;
}

/// In-memory, channel-backed `DurableQueue`. "Durable" here means
/// at-least-once within the process's lifetime; a real deployment would
/// back this with an external broker, but the interface is what the rest of
/// the system depends on.
pub struct ChannelDurableQueue {
    sender: mpsc::Sender<JobEnvelope>,
    receiver: Mutex<mpsc::Receiver<JobEnvelope>>,
}

impl ChannelDurableQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(capacity);
        Arc::new(Self {
            sender,
            receiver: Mutex::new(receiver),
        })
    }
}

#[async_trait]
impl DurableQueue for ChannelDurableQueue {
    async fn enqueue(&self, job: JobEnvelope) -> Result<(), QueueError> {
        self.sender.send(job).await.map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<JobEnvelope, QueueError> {
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(QueueError::Cancelled),
            job = receiver.recv() => job.ok_or(QueueError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips() {
        let queue = ChannelDurableQueue::new(10);
        let job = JobEnvelope::new(JobKind::Tagging(TaggingJob {
            chunk_id: Uuid::new_v4(),
            tenant_id: "acme".to_string(),
            content: "hello".to_string(),
        }));
        queue.enqueue(job.clone()).await.unwrap();

        let cancel = CancellationToken::new();
        let dequeued = queue.dequeue(&cancel).await.unwrap();
        match dequeued.kind {
            JobKind::Tagging(t) => assert_eq!(t.content, "hello"),
            _ => panic!("expected tagging job"),
        }
    }

    #[tokio::test]
    async fn dequeue_returns_promptly_on_cancellation() {
        let queue = ChannelDurableQueue::new(10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = queue.dequeue(&cancel).await;
        assert!(matches!(result, Err(QueueError::Cancelled)));
    }
}
