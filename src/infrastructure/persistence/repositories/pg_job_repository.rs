use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{JobFilter, JobRepository, RepositoryError, TransitionOutcome};
use crate::domain::{Job, JobId, JobState, JobStatus, NewJob, StoragePath, TranscriptionId};

const JOB_COLUMNS: &str = "id, transcription_id, filename, original_filename, storage_path, \
     status, transcribed_text, error_message, created_at, updated_at";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    transcription_id: i64,
    filename: String,
    original_filename: String,
    storage_path: String,
    status: String,
    transcribed_text: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = RepositoryError;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        let status = r
            .status
            .parse::<JobStatus>()
            .map_err(RepositoryError::CorruptRecord)?;
        let state = JobState::from_parts(status, r.transcribed_text, r.error_message)
            .map_err(RepositoryError::CorruptRecord)?;

        Ok(Job {
            id: JobId::from_uuid(r.id),
            transcription_id: TranscriptionId::new(r.transcription_id),
            filename: r.filename,
            original_filename: r.original_filename,
            storage_path: StoragePath::from_raw(r.storage_path),
            state,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::ConstraintViolation(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::ConnectionFailed(e.to_string())
        }
        _ => RepositoryError::QueryFailed(e.to_string()),
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn rows_to_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, RepositoryError> {
    rows.into_iter().map(Job::try_from).collect()
}

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create(&self, job: &NewJob) -> Result<Job, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO transcription_jobs
                (id, filename, original_filename, storage_path, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job.id.as_uuid())
            .bind(&job.filename)
            .bind(&job.original_filename)
            .bind(job.storage_path.as_str())
            .bind(JobStatus::Queued.as_str())
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed)?;

        Job::try_from(row)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM transcription_jobs WHERE id = $1");

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.map(Job::try_from).transpose()
    }

    #[instrument(skip(self, expected, next), fields(job_id = %id, status = %next.status()))]
    async fn transition(
        &self,
        id: JobId,
        expected: &[JobStatus],
        next: JobState,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let next_status = next.status();
        let allowed: Vec<String> = expected
            .iter()
            .filter(|s| s.can_transition_to(next_status))
            .map(|s| s.as_str().to_string())
            .collect();
        let (status, text, error) = next.into_parts();

        let sql = format!(
            r#"
            UPDATE transcription_jobs
            SET status = $1, transcribed_text = $2, error_message = $3, updated_at = $4
            WHERE id = $5 AND status = ANY($6)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, JobRow>(&sql)
            .bind(status.as_str())
            .bind(text)
            .bind(error)
            .bind(Utc::now())
            .bind(id.as_uuid())
            .bind(allowed)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        if let Some(row) = updated {
            return Ok(TransitionOutcome::Applied(Job::try_from(row)?));
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM transcription_jobs WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;

        match current {
            Some(s) => Ok(TransitionOutcome::Rejected {
                current: s.parse().map_err(RepositoryError::CorruptRecord)?,
            }),
            None => Ok(TransitionOutcome::Missing),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM transcription_jobs
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC, transcription_id DESC
            OFFSET $2 LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(i64::from(filter.skip))
            .bind(i64::from(filter.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;

        rows_to_jobs(rows)
    }

    #[instrument(skip(self))]
    async fn search_by_filename(&self, query: &str) -> Result<Vec<Job>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM transcription_jobs
            WHERE filename ILIKE '%' || $1 || '%' ESCAPE '\'
            ORDER BY created_at DESC, transcription_id DESC
            "#
        );

        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(escape_like(query))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;

        rows_to_jobs(rows)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))
    }
}
