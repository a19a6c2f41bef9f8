use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthSignal {
    ModelLoaded,
    Database,
    Queue,
    Workers,
}

impl HealthSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthSignal::ModelLoaded => "model_loaded",
            HealthSignal::Database => "db_healthy",
            HealthSignal::Queue => "queue_healthy",
            HealthSignal::Workers => "workers_active",
        }
    }
}

impl fmt::Display for HealthSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    pub signal: HealthSignal,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Composite health derived from every sampled signal.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub readings: Vec<SignalReading>,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn from_readings(readings: Vec<SignalReading>) -> Self {
        let issues: Vec<String> = readings
            .iter()
            .filter(|r| !r.passed)
            .map(|r| match &r.detail {
                Some(detail) => format!("{}: {}", r.signal, detail),
                None => r.signal.to_string(),
            })
            .collect();

        Self {
            status: if issues.is_empty() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            checked_at: Utc::now(),
            readings,
            issues,
        }
    }

    /// Report used when the aggregate itself could not be sampled.
    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            checked_at: Utc::now(),
            readings: Vec::new(),
            issues: vec![detail.into()],
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// `false` for a failing signal and for one that was never sampled.
    pub fn passed(&self, signal: HealthSignal) -> bool {
        self.readings
            .iter()
            .any(|r| r.signal == signal && r.passed)
    }

    pub fn failing(&self) -> Vec<HealthSignal> {
        self.readings
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.signal)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(signal: HealthSignal, passed: bool) -> SignalReading {
        SignalReading {
            signal,
            passed,
            detail: None,
        }
    }

    #[test]
    fn all_passing_readings_are_healthy() {
        let report = HealthReport::from_readings(vec![
            reading(HealthSignal::ModelLoaded, true),
            reading(HealthSignal::Database, true),
        ]);
        assert!(report.is_healthy());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn one_failing_reading_degrades_and_is_named() {
        let report = HealthReport::from_readings(vec![
            reading(HealthSignal::ModelLoaded, true),
            reading(HealthSignal::Queue, false),
        ]);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.failing(), vec![HealthSignal::Queue]);
        assert_eq!(report.issues, vec!["queue_healthy".to_string()]);
    }
}
