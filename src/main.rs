use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tolka::application::ports::{JobRepository, WorkQueue};
use tolka::application::services::{
    HealthAggregator, HealthMonitor, SubmissionService, TranscriptionWorker, WorkerPool,
};
use tolka::infrastructure::audio::TranscriptionEngineFactory;
use tolka::infrastructure::health::standard_probes;
use tolka::infrastructure::observability::{TracingConfig, init_tracing};
use tolka::infrastructure::persistence::{
    InMemoryJobRepository, PgJobRepository, create_pool, run_migrations,
};
use tolka::infrastructure::queue::InMemoryWorkQueue;
use tolka::infrastructure::storage::StagingStoreFactory;
use tolka::presentation::config::{DatabaseBackend, Environment, Settings};
use tolka::presentation::middleware::{ClientRateLimiter, RateLimit};
use tolka::presentation::{AppState, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(&TracingConfig::from_settings(
        environment,
        &settings.logging,
    ));

    let job_repository: Arc<dyn JobRepository> = match settings.database.backend {
        DatabaseBackend::Postgres => {
            let pool = create_pool(&settings.database.url, settings.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            Arc::new(PgJobRepository::new(pool))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory job store; records are lost on restart");
            Arc::new(InMemoryJobRepository::new())
        }
    };

    let staging_store = StagingStoreFactory::create(&settings.storage)
        .context("Failed to initialise staging store")?;
    let engine = TranscriptionEngineFactory::create(&settings.transcription)
        .context("Failed to initialise transcription engine")?;
    tracing::info!(engine = engine.name(), "Transcription engine ready");

    let queue = Arc::new(InMemoryWorkQueue::new(settings.worker.queue_capacity));
    let work_queue: Arc<dyn WorkQueue> = queue.clone();

    let submission_service = Arc::new(SubmissionService::new(
        Arc::clone(&job_repository),
        Arc::clone(&work_queue),
        Arc::clone(&staging_store),
        settings.uploads.policy(),
    ));

    let requeued = submission_service
        .requeue_stranded()
        .await
        .context("Failed to recover unfinished jobs")?;
    if requeued > 0 {
        tracing::info!(requeued, "Recovered unfinished jobs from a previous run");
    }

    let shutdown = CancellationToken::new();

    let worker = Arc::new(TranscriptionWorker::new(
        Arc::clone(&job_repository),
        Arc::clone(&staging_store),
        Arc::clone(&engine),
        Arc::clone(&work_queue),
        settings.worker.task_time_limit(),
    ));
    let pool = WorkerPool::spawn(
        worker,
        Arc::clone(&work_queue),
        settings.worker.concurrency,
        shutdown.child_token(),
    );

    let aggregator = HealthAggregator::new(
        standard_probes(
            Arc::clone(&job_repository),
            Arc::clone(&work_queue),
            Arc::clone(&engine),
            pool.activity(),
        ),
        settings.health.probe_timeout(),
    );
    let health_monitor = Arc::new(HealthMonitor::init(aggregator).await);
    let health_refresh = Arc::clone(&health_monitor)
        .spawn_refresh(settings.health.refresh_interval(), shutdown.child_token());

    let transcribe_limit: RateLimit = settings
        .rate_limit
        .transcribe
        .parse()
        .map_err(anyhow::Error::msg)?;
    let transcribe_limiter = Arc::new(ClientRateLimiter::new(transcribe_limit.clone()));
    let limiter_sweep = {
        let limiter = Arc::clone(&transcribe_limiter);
        let cancel = shutdown.child_token();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(transcribe_limit.window);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => limiter.forget_idle_clients(),
                }
            }
        })
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        submission_service,
        job_repository,
        health_monitor,
        transcribe_limiter,
        settings,
    };
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = %environment, "Listening");

    let signal = shutdown.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown requested");
        signal.cancel();
    })
    .await?;

    shutdown.cancel();
    queue.close();
    pool.join().await;
    if let Err(e) = health_refresh.await {
        tracing::error!(error = %e, "Health refresh task failed");
    }
    if let Err(e) = limiter_sweep.await {
        tracing::error!(error = %e, "Rate limiter sweep task failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
