//! Ingestion tunables, passed explicitly into [`crate::ingest`]

use std::time::Duration;

use serde::Deserialize;

use crate::error::IngestError;

/// Records accumulated by a file worker before each push
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Queue ceiling in records; a safety valve, not a working limit
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000_000_000;

/// Sleep between push attempts while the queue is full
pub const DEFAULT_PUSH_BACKOFF: Duration = Duration::from_secs(1);

/// Longest single wait of the consumer for new records
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What a failing source does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// First failure cancels all workers and is surfaced to the consumer
    #[default]
    FailFast,
    /// Failures are logged and collected; the failed source contributes
    /// whatever it delivered before failing
    Tolerate,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(Self::FailFast),
            "tolerate" => Ok(Self::Tolerate),
            other => Err(format!(
                "unknown failure policy '{other}' (expected fail-fast or tolerate)"
            )),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::Tolerate => write!(f, "tolerate"),
        }
    }
}

/// Runtime configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub push_backoff: Duration,
    pub poll_interval: Duration,
    /// Threads running file workers
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub verify_checksums: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            push_backoff: DEFAULT_PUSH_BACKOFF,
            poll_interval: DEFAULT_POLL_INTERVAL,
            workers: default_workers(),
            failure_policy: FailurePolicy::default(),
            verify_checksums: true,
        }
    }
}

/// Available parallelism, capped at 16
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(16)
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.batch_size == 0 {
            return Err(IngestError::InvalidConfig("batch_size must be >= 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(IngestError::InvalidConfig(
                "queue_capacity must be >= 1".into(),
            ));
        }
        if self.workers == 0 {
            return Err(IngestError::InvalidConfig("workers must be >= 1".into()));
        }
        Ok(())
    }

    /// Records per push: a batch never exceeds what the queue can hold
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.min(self.queue_capacity).max(1)
    }
}
