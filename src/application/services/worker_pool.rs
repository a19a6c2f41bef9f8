use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{WorkQueue, WorkQueueError};

use super::transcription_worker::{TranscriptionWorker, WorkerError};

const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Live worker count shared with the health probes.
#[derive(Debug, Clone, Default)]
pub struct WorkerActivity(Arc<AtomicUsize>);

impl WorkerActivity {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ActiveWorker {
        self.0.fetch_add(1, Ordering::SeqCst);
        ActiveWorker(self.clone())
    }
}

struct ActiveWorker(WorkerActivity);

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        (self.0).0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// N workers consuming one shared queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    activity: WorkerActivity,
}

impl WorkerPool {
    pub fn spawn(
        worker: Arc<TranscriptionWorker>,
        queue: Arc<dyn WorkQueue>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        let activity = WorkerActivity::default();
        let handles = (0..concurrency.max(1))
            .map(|index| {
                let guard = activity.enter();
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(&worker),
                    Arc::clone(&queue),
                    cancel.clone(),
                    guard,
                ))
            })
            .collect();

        tracing::info!(concurrency, "Transcription worker pool started");
        Self { handles, activity }
    }

    pub fn activity(&self) -> WorkerActivity {
        self.activity.clone()
    }

    /// Waits for every worker to stop. In-flight jobs finish first.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Transcription worker panicked");
            }
        }
    }
}

async fn run_worker(
    index: usize,
    worker: Arc<TranscriptionWorker>,
    queue: Arc<dyn WorkQueue>,
    cancel: CancellationToken,
    _active: ActiveWorker,
) {
    tracing::info!(worker = index, "Transcription worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.dequeue() => next,
        };

        let delivery = match next {
            Ok(delivery) => delivery,
            Err(WorkQueueError::Closed) => break,
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Dequeue failed");
                tokio::time::sleep(DEQUEUE_ERROR_BACKOFF).await;
                continue;
            }
        };

        let span = tracing::info_span!(
            "transcription_job",
            worker = index,
            job_id = %delivery.item.job_id,
            redelivered = delivery.redelivered,
        );

        let tag = delivery.tag;
        let handling = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.handle(delivery).await }.instrument(span.clone()))
        };

        match handling.await {
            Ok(Ok(outcome)) => span.in_scope(|| tracing::debug!(?outcome, "Delivery settled")),
            Ok(Err(e @ WorkerError::Unacknowledged(_))) => span.in_scope(|| {
                tracing::error!(error = %e, "Job settled but delivery left unacknowledged")
            }),
            Ok(Err(e)) => {
                span.in_scope(|| tracing::error!(error = %e, "Delivery handling failed"));
                tokio::time::sleep(DEQUEUE_ERROR_BACKOFF).await;
            }
            Err(join_err) => {
                span.in_scope(|| tracing::error!(error = %join_err, "Delivery handling panicked"));
                match queue.nack(tag).await {
                    Ok(()) => span.in_scope(|| tracing::warn!("Delivery returned to queue")),
                    Err(e) => span.in_scope(|| {
                        tracing::error!(error = %e, "Failed to return delivery to the queue")
                    }),
                }
            }
        }
    }

    tracing::info!(worker = index, "Transcription worker stopped");
}
