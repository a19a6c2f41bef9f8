//! Requires Docker. Run with `cargo test --test pg_job_repository_test -- --ignored`.

mod helpers;

use tolka::application::ports::{JobFilter, JobRepository, TransitionOutcome};
use tolka::domain::{JobState, JobStatus, NewJob};

use helpers::TestPostgres;

fn new_job(original: &str) -> NewJob {
    NewJob::new(
        tolka::application::services::unique_filename(original),
        original.to_string(),
    )
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_new_job_when_creating_and_retrieving_then_job_is_persisted_as_queued() {
    let pg = TestPostgres::new().await;
    let job = new_job("lecture.mp3");

    let created = pg.job_repository.create(&job).await.unwrap();
    let fetched = pg
        .job_repository
        .get_by_id(job.id)
        .await
        .unwrap()
        .expect("job should exist");

    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.transcription_id, created.transcription_id);
    assert_eq!(fetched.state, JobState::Queued);
    assert_eq!(fetched.original_filename, "lecture.mp3");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_processing_job_when_completing_then_status_and_text_are_written_together() {
    let pg = TestPostgres::new().await;
    let job = new_job("talk.mp3");
    pg.job_repository.create(&job).await.unwrap();

    pg.job_repository
        .transition(job.id, &[JobStatus::Queued], JobState::Processing)
        .await
        .unwrap();
    let outcome = pg
        .job_repository
        .transition(
            job.id,
            &[JobStatus::Processing],
            JobState::Completed {
                text: "transcript".into(),
            },
        )
        .await
        .unwrap();

    match outcome {
        TransitionOutcome::Applied(updated) => {
            assert_eq!(updated.state.text(), Some("transcript"));
        }
        other => panic!("expected applied transition, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_completed_job_when_transitioning_again_then_is_rejected_with_current_status() {
    let pg = TestPostgres::new().await;
    let job = new_job("done.mp3");
    pg.job_repository.create(&job).await.unwrap();
    pg.job_repository
        .transition(job.id, &[JobStatus::Queued], JobState::Processing)
        .await
        .unwrap();
    pg.job_repository
        .transition(
            job.id,
            &[JobStatus::Processing],
            JobState::Completed { text: "a".into() },
        )
        .await
        .unwrap();

    let outcome = pg
        .job_repository
        .transition(
            job.id,
            &[JobStatus::Queued, JobStatus::Processing],
            JobState::Processing,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TransitionOutcome::Rejected {
            current: JobStatus::Completed
        }
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_several_jobs_when_listing_and_searching_then_filters_apply() {
    let pg = TestPostgres::new().await;
    for name in ["alpha.mp3", "beta.mp3", "alpha_two.mp3"] {
        pg.job_repository.create(&new_job(name)).await.unwrap();
    }

    let all = pg.job_repository.list(JobFilter::default()).await.unwrap();
    let completed = pg
        .job_repository
        .list(JobFilter::with_status(JobStatus::Completed))
        .await
        .unwrap();
    let found = pg.job_repository.search_by_filename("ALPHA").await.unwrap();
    let percent = pg.job_repository.search_by_filename("%").await.unwrap();

    assert_eq!(all.len(), 3);
    assert!(completed.is_empty());
    assert_eq!(found.len(), 2);
    assert!(percent.is_empty());
    pg.job_repository.ping().await.unwrap();
}
