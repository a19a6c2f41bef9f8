use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::HealthProbe;
use crate::domain::{HealthReport, SignalReading};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Samples every probe concurrently and reduces the readings to one status.
pub struct HealthAggregator {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>, probe_timeout: Duration) -> Self {
        Self {
            probes,
            probe_timeout,
        }
    }

    /// A probe that errors, panics or overruns `probe_timeout` counts as failing.
    pub async fn sample(&self) -> HealthReport {
        let readings = join_all(self.probes.iter().map(|probe| {
            let probe = Arc::clone(probe);
            let limit = self.probe_timeout;
            async move {
                let signal = probe.signal();
                let check = tokio::spawn(async move { probe.check().await });
                let abort = check.abort_handle();
                let result = match tokio::time::timeout(limit, check).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => Err(format!("probe aborted: {join_err}")),
                    Err(_) => {
                        abort.abort();
                        Err(format!("timed out after {}ms", limit.as_millis()))
                    }
                };
                if let Err(detail) = &result {
                    tracing::warn!(signal = %signal, detail = %detail, "Health signal failing");
                }
                SignalReading {
                    signal,
                    passed: result.is_ok(),
                    detail: result.err(),
                }
            }
        }))
        .await;

        HealthReport::from_readings(readings)
    }
}

/// Process-wide latest health report.
///
/// `init` takes the first sample; `spawn_refresh` resamples on a fixed period.
/// Readers get the last completed sample and never wait on probes.
pub struct HealthMonitor {
    aggregator: HealthAggregator,
    latest: watch::Sender<HealthReport>,
}

impl HealthMonitor {
    pub async fn init(aggregator: HealthAggregator) -> Self {
        let first = aggregator.sample().await;
        tracing::info!(status = first.status.as_str(), "Initial health sample taken");
        let (latest, _) = watch::channel(first);
        Self { aggregator, latest }
    }

    pub fn latest(&self) -> HealthReport {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.latest.subscribe()
    }

    pub async fn refresh(&self) -> HealthReport {
        let report = self.aggregator.sample().await;
        let previous = self.latest.send_replace(report.clone());
        if previous.status != report.status {
            tracing::info!(
                from = previous.status.as_str(),
                to = report.status.as_str(),
                issues = ?report.issues,
                "Health status changed"
            );
        }
        report
    }

    pub fn spawn_refresh(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.refresh().await;
                    }
                }
            }
            tracing::debug!("Health refresh loop stopped");
        })
    }
}
