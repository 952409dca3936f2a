//! Consumer side of an ingestion run.
//!
//! [`RecordStream`] interleaves draining the shared queue with polling the
//! liveness tracker. It moves `Running → Draining → Terminated`:
//!
//! - `Running`: hand out whatever the queue has; when it is empty, check
//!   worker reports. Once no worker is alive, switch to `Draining`.
//! - `Draining`: keep handing out records until every worker has reported,
//!   then drain the queue one final time. Workers push their last batch
//!   before reporting, so nothing can arrive after this drain.
//! - `Terminated`: hand out the remaining buffer, then the deferred error
//!   (fail-fast only), then end.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::{FailurePolicy, IngestConfig};
use crate::error::IngestError;
use crate::liveness::{LivenessTracker, WorkerStatus};
use crate::queue::SharedQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Running,
    Draining,
    Terminated,
}

/// Result of one non-blocking poll
#[derive(Debug)]
pub enum StreamPoll<R> {
    Record(R),
    /// Nothing available yet; workers are still running
    Pending,
    Failed(IngestError),
    Done,
}

/// A source that failed or crashed during the run
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Counters for a finished (or in-flight) run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub sources: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub records: usize,
    /// Pushes rejected by a full queue (each followed by a backoff)
    pub queue_rejections: u64,
}

impl IngestSummary {
    pub fn log(&self) {
        log::info!(
            "Sources: {}/{} completed ({} failed, {} cancelled)",
            self.completed,
            self.sources,
            self.failed,
            self.cancelled
        );
        log::info!("Records: {}", self.records);
        if self.queue_rejections > 0 {
            log::info!("Queue backpressure events: {}", self.queue_rejections);
        }
    }
}

/// Lazy, single-pass sequence of decoded records from many sources.
///
/// Records from one source keep their file order; sources interleave
/// freely. Dropping the stream early cancels the remaining workers.
pub struct RecordStream<R> {
    queue: Arc<SharedQueue<R>>,
    tracker: LivenessTracker,
    buffer: VecDeque<R>,
    state: StreamState,
    policy: FailurePolicy,
    poll_interval: Duration,
    cancel: CancelToken,
    error: Option<IngestError>,
    failures: Vec<SourceFailure>,
    completed: usize,
    cancelled: usize,
    yielded: usize,
    // Kept alive for the workers; dropped on termination
    pool: Option<rayon::ThreadPool>,
}

impl<R> RecordStream<R> {
    pub(crate) fn new(
        queue: Arc<SharedQueue<R>>,
        tracker: LivenessTracker,
        pool: rayon::ThreadPool,
        config: &IngestConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            queue,
            tracker,
            buffer: VecDeque::new(),
            state: StreamState::Running,
            policy: config.failure_policy,
            poll_interval: config.poll_interval,
            cancel,
            error: None,
            failures: Vec::new(),
            completed: 0,
            cancelled: 0,
            yielded: 0,
            pool: Some(pool),
        }
    }

    /// Non-blocking pull: returns [`StreamPoll::Pending`] instead of waiting
    pub fn poll_next(&mut self) -> StreamPoll<R> {
        self.step(Duration::ZERO)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Token that cancels this run's workers
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Sources that failed so far (all of them under `Tolerate`)
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    pub fn summary(&self) -> IngestSummary {
        IngestSummary {
            sources: self.tracker.handles().len(),
            completed: self.completed,
            failed: self.failures.len(),
            cancelled: self.cancelled,
            records: self.yielded,
            queue_rejections: self.queue.stats().rejected(),
        }
    }

    fn step(&mut self, wait: Duration) -> StreamPoll<R> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.yielded += 1;
                return StreamPoll::Record(record);
            }
            match self.state {
                StreamState::Terminated => {
                    return match self.error.take() {
                        Some(e) => StreamPoll::Failed(e),
                        None => StreamPoll::Done,
                    };
                }
                StreamState::Draining => {
                    let alive = self.tracker.is_any_alive();
                    self.observe_reports();
                    if alive {
                        // Cancelled workers may still flush their last batch
                        let records = self.queue.pop_many_timeout(usize::MAX, wait);
                        if records.is_empty() {
                            return StreamPoll::Pending;
                        }
                        self.buffer.extend(records);
                        continue;
                    }
                    // Every worker has reported: nothing can arrive after this drain
                    self.buffer.extend(self.queue.try_pop_many(usize::MAX));
                    self.terminate();
                }
                StreamState::Running => {
                    let records = self.queue.pop_many_timeout(usize::MAX, wait);
                    if !records.is_empty() {
                        self.buffer.extend(records);
                        continue;
                    }
                    let alive = self.tracker.is_any_alive();
                    self.observe_reports();
                    if self.state == StreamState::Running {
                        if alive {
                            return StreamPoll::Pending;
                        }
                        log::debug!("all workers finished, draining");
                        self.state = StreamState::Draining;
                    }
                }
            }
        }
    }

    fn observe_reports(&mut self) {
        for report in self.tracker.poll() {
            match report.status {
                WorkerStatus::Completed { records } => {
                    self.completed += 1;
                    log::debug!("{}: done ({records} records)", report.source.display());
                }
                WorkerStatus::Cancelled => self.cancelled += 1,
                WorkerStatus::Failed(e) => self.fail(report.source, e),
                WorkerStatus::Crashed => {
                    let e = IngestError::WorkerCrash {
                        path: report.source.clone(),
                    };
                    self.fail(report.source, e);
                }
            }
        }
    }

    fn fail(&mut self, source: PathBuf, error: IngestError) {
        self.failures.push(SourceFailure {
            source,
            reason: error.to_string(),
        });
        match self.policy {
            FailurePolicy::Tolerate => {
                log::warn!("{error} (source skipped)");
            }
            FailurePolicy::FailFast => {
                if self.error.is_none() {
                    log::error!("{error}");
                    self.error = Some(error);
                    self.cancel.cancel();
                    self.state = StreamState::Draining;
                } else {
                    log::debug!("additional failure after abort: {error}");
                }
            }
        }
    }

    fn terminate(&mut self) {
        self.state = StreamState::Terminated;
        self.pool = None;
        log::debug!(
            "ingestion terminated: {} buffered, {} delivered",
            self.buffer.len(),
            self.yielded
        );
    }
}

impl<R> Iterator for RecordStream<R> {
    type Item = Result<R, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.step(self.poll_interval) {
                StreamPoll::Record(record) => return Some(Ok(record)),
                StreamPoll::Failed(e) => return Some(Err(e)),
                StreamPoll::Done => return None,
                StreamPoll::Pending => {}
            }
        }
    }
}

impl<R> Drop for RecordStream<R> {
    fn drop(&mut self) {
        if self.state != StreamState::Terminated {
            self.cancel.cancel();
        }
    }
}
