mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use tolka::application::ports::{
    JobRepository, StagingStore, StagingStoreError, TranscriptionEngine, WorkQueue,
};
use tolka::application::services::{TranscriptionWorker, WorkOutcome, WorkerError, WorkerPool};
use tolka::domain::{JobId, JobState, JobStatus, StoragePath};

use helpers::{EngineBehaviour, ScriptedEngine, Stack, mp3_upload};

fn worker(stack: &Stack, engine: Arc<ScriptedEngine>, limit: Duration) -> TranscriptionWorker {
    TranscriptionWorker::new(
        stack.repository(),
        stack.store(),
        engine as Arc<dyn TranscriptionEngine>,
        stack.queue(),
        limit,
    )
}

async fn submit_one(stack: &Stack, name: &str) -> tolka::domain::JobId {
    let batch = stack.submission.submit(vec![mp3_upload(name)]).await.unwrap();
    batch.accepted().next().expect("accepted").id
}

#[tokio::test]
async fn given_queued_job_when_engine_succeeds_then_job_completes_with_text() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Succeed(
        "hello world".into(),
    )));
    let worker = worker(&stack, engine.clone(), Duration::from_secs(5));
    let job_id = submit_one(&stack, "talk.mp3").await;

    let delivery = stack.queue.dequeue().await.unwrap();
    let outcome = worker.handle(delivery).await.unwrap();

    assert_eq!(outcome, WorkOutcome::Completed);
    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(
        job.state,
        JobState::Completed {
            text: "hello world".into()
        }
    );
    assert_eq!(stack.queue.in_flight(), 0);
    assert!(stack.store.is_empty().await);
}

#[tokio::test]
async fn given_queued_job_when_engine_fails_then_reason_is_stored() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Fail(
        "corrupt frame".into(),
    )));
    let worker = worker(&stack, engine, Duration::from_secs(5));
    let job_id = submit_one(&stack, "broken.mp3").await;

    let outcome = worker
        .handle(stack.queue.dequeue().await.unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, WorkOutcome::Failed);
    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    match job.state {
        JobState::Failed { reason } => assert!(reason.contains("corrupt frame")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn given_engine_panics_when_processing_then_job_fails_instead_of_sticking() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Panic));
    let worker = worker(&stack, engine, Duration::from_secs(5));
    let job_id = submit_one(&stack, "crash.mp3").await;

    let outcome = worker
        .handle(stack.queue.dequeue().await.unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, WorkOutcome::Failed);
    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn given_engine_overruns_the_time_limit_when_processing_then_job_fails_as_timed_out() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Hang));
    let worker = worker(&stack, engine, Duration::from_secs(180));
    let job_id = submit_one(&stack, "long.mp3").await;

    let outcome = worker
        .handle(stack.queue.dequeue().await.unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, WorkOutcome::Failed);
    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    match job.state {
        JobState::Failed { reason } => assert!(reason.contains("timed out")),
        other => panic!("expected timeout failure, got {:?}", other),
    }
}

#[tokio::test]
async fn given_terminal_job_when_delivered_again_then_result_is_not_overwritten() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Succeed(
        "first".into(),
    )));
    let worker = worker(&stack, engine.clone(), Duration::from_secs(5));
    let job_id = submit_one(&stack, "dup.mp3").await;

    let delivery = stack.queue.dequeue().await.unwrap();
    let duplicate = delivery.clone();
    worker.handle(delivery).await.unwrap();

    stack.queue.requeue(duplicate.item).await.unwrap();
    let outcome = worker
        .handle(stack.queue.dequeue().await.unwrap())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WorkOutcome::Skipped {
            current: Some(JobStatus::Completed)
        }
    );
    assert_eq!(engine.calls(), 1);
    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed { text: "first".into() });
}

#[tokio::test]
async fn given_store_unavailable_when_claiming_then_delivery_is_returned_to_queue() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Succeed("x".into())));
    let worker = worker(&stack, engine.clone(), Duration::from_secs(5));
    let job_id = submit_one(&stack, "retry.mp3").await;

    stack.repository.set_available(false);
    let result = worker.handle(stack.queue.dequeue().await.unwrap()).await;
    assert!(result.is_err());
    assert_eq!(stack.queue.depth().await.unwrap(), 1);

    stack.repository.set_available(true);
    let redelivered = stack.queue.dequeue().await.unwrap();
    assert!(redelivered.redelivered);
    assert_eq!(worker.handle(redelivered).await.unwrap(), WorkOutcome::Completed);

    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
}

#[tokio::test]
async fn given_worker_pool_when_jobs_are_submitted_then_every_job_reaches_a_terminal_state() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Succeed("ok".into())));
    let worker = Arc::new(worker(&stack, engine.clone(), Duration::from_secs(5)));
    let cancel = CancellationToken::new();
    let pool = WorkerPool::spawn(worker, stack.queue(), 3, cancel.clone());
    assert_eq!(pool.activity().active(), 3);

    let batch = stack
        .submission
        .submit((0..5).map(|i| mp3_upload(&format!("clip{}.mp3", i))).collect())
        .await
        .unwrap();
    let ids: Vec<_> = batch.accepted().map(|job| job.id).collect();

    let repository = stack.repository();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let mut done = 0;
            for id in &ids {
                let job = repository.get_by_id(*id).await.unwrap().unwrap();
                if job.state.is_terminal() {
                    done += 1;
                }
            }
            if done == ids.len() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all jobs should finish");

    assert_eq!(engine.calls(), 5);

    let activity = pool.activity();
    cancel.cancel();
    pool.join().await;
    assert_eq!(activity.active(), 0);
}

/// Store whose first fetch panics; later calls pass through.
struct PanicOnFirstFetch {
    inner: Arc<dyn StagingStore>,
    panicked: AtomicBool,
}

#[async_trait]
impl StagingStore for PanicOnFirstFetch {
    async fn store(&self, path: &StoragePath, data: Bytes) -> Result<u64, StagingStoreError> {
        self.inner.store(path, data).await
    }

    async fn fetch(&self, path: &StoragePath) -> Result<Bytes, StagingStoreError> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("staging store crashed");
        }
        self.inner.fetch(path).await
    }

    async fn delete(&self, path: &StoragePath) -> Result<(), StagingStoreError> {
        self.inner.delete(path).await
    }
}

async fn wait_for_terminal(repository: &Arc<dyn JobRepository>, job_id: JobId) -> JobState {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = repository.get_by_id(job_id).await.unwrap().unwrap();
            if job.state.is_terminal() {
                return job.state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should reach a terminal state")
}

#[tokio::test]
async fn given_handling_panics_when_pool_runs_then_delivery_is_redelivered_and_worker_survives() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Succeed("recovered".into())));
    let store = Arc::new(PanicOnFirstFetch {
        inner: stack.store(),
        panicked: AtomicBool::new(false),
    });
    let worker = Arc::new(TranscriptionWorker::new(
        stack.repository(),
        store.clone() as Arc<dyn StagingStore>,
        engine.clone() as Arc<dyn TranscriptionEngine>,
        stack.queue(),
        Duration::from_secs(5),
    ));
    let cancel = CancellationToken::new();
    let pool = WorkerPool::spawn(worker, stack.queue(), 1, cancel.clone());

    let job_id = submit_one(&stack, "crash.mp3").await;
    let state = wait_for_terminal(&stack.repository(), job_id).await;

    assert!(store.panicked.load(Ordering::SeqCst));
    assert_eq!(
        state,
        JobState::Completed {
            text: "recovered".into()
        }
    );
    assert_eq!(engine.calls(), 1);
    assert_eq!(stack.queue.in_flight(), 0);
    assert_eq!(pool.activity().active(), 1);

    cancel.cancel();
    pool.join().await;
}

#[tokio::test]
async fn given_delivery_already_acked_when_handling_then_ack_failure_is_reported_without_requeue() {
    let stack = Stack::new();
    let engine = Arc::new(ScriptedEngine::new(EngineBehaviour::Succeed("done".into())));
    let worker = worker(&stack, engine, Duration::from_secs(5));
    let job_id = submit_one(&stack, "twice.mp3").await;

    let delivery = stack.queue.dequeue().await.unwrap();
    stack.queue.ack(delivery.tag).await.unwrap();
    let result = worker.handle(delivery).await;

    assert!(matches!(result, Err(WorkerError::Unacknowledged(_))));
    let job = stack.repository.get_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(stack.queue.depth().await.unwrap(), 0);
}
