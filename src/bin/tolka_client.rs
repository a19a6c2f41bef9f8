use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tolka::client::{ApiClient, BatchTracker, FileOutcome, PollOutcome, PollPolicy, SubmitError};
use tolka::domain::{AudioUpload, JobId, JobState};
use tolka::infrastructure::observability::{TracingConfig, init_tracing};

#[derive(Parser)]
#[command(name = "tolka-client", about = "Submit audio for transcription and follow the results")]
struct Cli {
    /// Base URL of the transcription API.
    #[arg(long, env = "TOLKA_URL", default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit files and wait until every job finishes.
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Seconds between status checks.
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Checks per job before giving up.
        #[arg(long, default_value_t = 60)]
        max_attempts: u32,
    },
    /// Show the current status of one job.
    Status { task_id: JobId },
    /// Show the service health report.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(&TracingConfig {
        default_filter: "warn,tolka=info".to_string(),
        ..TracingConfig::default()
    });

    let cli = Cli::parse();
    let client = ApiClient::new(cli.url.clone())?;

    match cli.command {
        Command::Submit {
            files,
            interval,
            max_attempts,
        } => submit(client, files, interval, max_attempts).await,
        Command::Status { task_id } => {
            match client.status(task_id).await? {
                JobState::Completed { text } => println!("completed\n{}", text),
                JobState::Failed { reason } => println!("failed: {}", reason),
                state => println!("{}", state.status()),
            }
            Ok(())
        }
        Command::Health => {
            let report = client.health().await;
            println!("{}", report.status.as_str());
            for issue in &report.issues {
                println!("  - {}", issue);
            }
            Ok(())
        }
    }
}

async fn submit(
    client: ApiClient,
    paths: Vec<PathBuf>,
    interval: u64,
    max_attempts: u32,
) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(AudioUpload::new(filename, data));
    }

    let client = Arc::new(client);
    let tracker = BatchTracker::new(
        client.clone(),
        client,
        PollPolicy {
            interval: Duration::from_secs(interval),
            max_attempts,
        },
    );

    let report = match tracker.submit_and_wait(files).await {
        Ok(report) => report,
        Err(SubmitError::RateLimited { limit }) => {
            anyhow::bail!(
                "Too many submissions, try again later (limit: {})",
                limit.as_deref().unwrap_or("unknown")
            );
        }
        Err(e) => return Err(e.into()),
    };

    for entry in &report.entries {
        match &entry.outcome {
            FileOutcome::Polled(PollOutcome::Completed { text }) => {
                println!("{}: completed\n{}\n", entry.filename, text)
            }
            FileOutcome::Polled(PollOutcome::Failed { reason }) => {
                println!("{}: failed: {}", entry.filename, reason)
            }
            FileOutcome::Polled(PollOutcome::TimedOut { attempts }) => {
                println!("{}: no result after {} checks", entry.filename, attempts)
            }
            FileOutcome::Polled(PollOutcome::TransportFailed { message }) => {
                println!("{}: status check failed: {}", entry.filename, message)
            }
            FileOutcome::NotQueued { reason } => {
                println!("{}: not queued: {}", entry.filename, reason)
            }
        }
    }

    println!(
        "{} completed, {} failed, {} timed out",
        report.successes().count(),
        report.failures().count(),
        report.timeouts().count()
    );
    Ok(())
}
