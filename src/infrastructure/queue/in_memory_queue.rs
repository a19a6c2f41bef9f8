use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::application::ports::{WorkQueue, WorkQueueError};
use crate::domain::{Delivery, DeliveryTag, WorkItem};

struct QueueState {
    pending: VecDeque<(WorkItem, bool)>,
    in_flight: HashMap<DeliveryTag, WorkItem>,
    closed: bool,
}

/// Bounded FIFO shared by every worker of the pool.
///
/// Dequeued items move to an in-flight set and leave the queue only on `ack`.
pub struct InMemoryWorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    next_tag: AtomicU64,
}

impl InMemoryWorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            next_tag: AtomicU64::new(1),
        }
    }

    /// Stops handing out work. Waiting consumers return `Closed`.
    pub fn close(&self) {
        match self.lock() {
            Ok(mut state) => state.closed = true,
            Err(e) => tracing::error!(error = %e, "Failed to close work queue"),
        }
        self.notify.notify_waiters();
    }

    pub fn in_flight(&self) -> usize {
        self.lock().map(|s| s.in_flight.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, WorkQueueError> {
        self.state
            .lock()
            .map_err(|e| WorkQueueError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn push(&self, item: WorkItem, redelivered: bool) -> Result<(), WorkQueueError> {
        {
            let mut state = self.lock()?;
            if state.closed {
                return Err(WorkQueueError::Closed);
            }
            if state.pending.len() >= self.capacity {
                return Err(WorkQueueError::Full(self.capacity));
            }
            state.pending.push_back((item, redelivered));
        }
        self.notify.notify_one();
        Ok(())
    }

    fn try_take(&self) -> Result<Option<Delivery>, WorkQueueError> {
        let mut state = self.lock()?;
        if let Some((item, redelivered)) = state.pending.pop_front() {
            let tag = DeliveryTag::new(self.next_tag.fetch_add(1, Ordering::Relaxed));
            state.in_flight.insert(tag, item.clone());
            return Ok(Some(Delivery {
                tag,
                item,
                redelivered,
            }));
        }
        if state.closed {
            return Err(WorkQueueError::Closed);
        }
        Ok(None)
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, item: WorkItem) -> Result<(), WorkQueueError> {
        self.push(item, false)
    }

    async fn requeue(&self, item: WorkItem) -> Result<(), WorkQueueError> {
        self.push(item, true)
    }

    async fn dequeue(&self) -> Result<Delivery, WorkQueueError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_take()? {
                return Ok(delivery);
            }
            notified.await;
        }
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), WorkQueueError> {
        let mut state = self.lock()?;
        state
            .in_flight
            .remove(&tag)
            .map(|_| ())
            .ok_or(WorkQueueError::UnknownDelivery(tag.value()))
    }

    async fn nack(&self, tag: DeliveryTag) -> Result<(), WorkQueueError> {
        {
            let mut state = self.lock()?;
            let item = state
                .in_flight
                .remove(&tag)
                .ok_or(WorkQueueError::UnknownDelivery(tag.value()))?;
            state.pending.push_front((item, true));
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn depth(&self) -> Result<usize, WorkQueueError> {
        Ok(self.lock()?.pending.len())
    }

    async fn ping(&self) -> Result<(), WorkQueueError> {
        if self.lock()?.closed {
            Err(WorkQueueError::Unavailable("queue is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::{JobId, StoragePath};

    fn item() -> WorkItem {
        let job_id = JobId::new();
        WorkItem {
            job_id,
            storage_path: StoragePath::new(&job_id, "a.mp3"),
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = InMemoryWorkQueue::new(8);
        let first = item();
        let second = item();
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap().item, first);
        assert_eq!(queue.dequeue().await.unwrap().item, second);
    }

    #[tokio::test]
    async fn unacked_item_is_not_lost_after_nack() {
        let queue = InMemoryWorkQueue::new(8);
        let work = item();
        queue.enqueue(work.clone()).await.unwrap();

        let delivery = queue.dequeue().await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 0);
        queue.nack(delivery.tag).await.unwrap();

        let again = queue.dequeue().await.unwrap();
        assert_eq!(again.item, work);
        assert!(again.redelivered);
    }

    #[tokio::test]
    async fn rejects_when_full() {
        let queue = InMemoryWorkQueue::new(1);
        queue.enqueue(item()).await.unwrap();
        assert!(matches!(
            queue.enqueue(item()).await,
            Err(WorkQueueError::Full(1))
        ));
    }

    #[tokio::test]
    async fn waiting_consumer_wakes_on_enqueue() {
        let queue = Arc::new(InMemoryWorkQueue::new(8));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let work = item();
        queue.enqueue(work.clone()).await.unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(delivery.item, work);
    }

    #[tokio::test]
    async fn close_releases_waiting_consumers() {
        let queue = Arc::new(InMemoryWorkQueue::new(8));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(WorkQueueError::Closed)));
    }
}
