use async_trait::async_trait;

use crate::domain::{Delivery, DeliveryTag, WorkItem};

/// At-least-once handoff of work items to workers.
///
/// A dequeued item stays in flight until it is acked; a nack puts it back
/// for redelivery.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: WorkItem) -> Result<(), WorkQueueError>;

    /// Enqueues an item recovered outside the queue (e.g. at startup), marked redelivered.
    async fn requeue(&self, item: WorkItem) -> Result<(), WorkQueueError>;

    /// Waits until an item is available. Returns `Closed` once the queue is shut down.
    async fn dequeue(&self) -> Result<Delivery, WorkQueueError>;

    async fn ack(&self, tag: DeliveryTag) -> Result<(), WorkQueueError>;

    async fn nack(&self, tag: DeliveryTag) -> Result<(), WorkQueueError>;

    async fn depth(&self) -> Result<usize, WorkQueueError>;

    async fn ping(&self) -> Result<(), WorkQueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum WorkQueueError {
    #[error("queue is full (capacity {0})")]
    Full(usize),
    #[error("queue is closed")]
    Closed,
    #[error("unknown delivery tag: {0}")]
    UnknownDelivery(u64),
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}
