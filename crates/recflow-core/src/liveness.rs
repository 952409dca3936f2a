//! Worker liveness via explicit completion reports.
//!
//! Each registered worker owns a [`CompletionGuard`]. The guard reports the
//! worker's final status over a channel exactly once: explicitly through
//! [`CompletionGuard::complete`], or as [`WorkerStatus::Crashed`] when it is
//! dropped without completing (panic unwinding, task never run). A worker
//! pushes its last batch before completing, so once the tracker has seen
//! every report the queue holds everything that will ever arrive.

use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

use crate::error::IngestError;

pub type WorkerId = usize;

/// Final status of a file worker
#[derive(Debug)]
pub enum WorkerStatus {
    Completed { records: usize },
    Failed(IngestError),
    Cancelled,
    /// Worker went away without reporting
    Crashed,
}

impl WorkerStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Crashed)
    }
}

/// One file worker's lifetime as seen by the tracker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub source: PathBuf,
    /// Last observed state; flips to false once the report arrives
    pub alive: bool,
}

/// A completion observed by the tracker
#[derive(Debug)]
pub struct WorkerReport {
    pub id: WorkerId,
    pub source: PathBuf,
    pub status: WorkerStatus,
}

type Completion = (WorkerId, WorkerStatus);

/// RAII reporter moved into a worker task
pub struct CompletionGuard {
    id: WorkerId,
    status: Option<WorkerStatus>,
    sender: Sender<Completion>,
}

impl CompletionGuard {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Report the final status (sent when the guard drops here)
    pub fn complete(mut self, status: WorkerStatus) {
        self.status = Some(status);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let status = self.status.take().unwrap_or(WorkerStatus::Crashed);
        // Receiver gone means nobody is waiting any more
        let _ = self.sender.send((self.id, status));
    }
}

/// Tracks which file workers have not reported completion yet
pub struct LivenessTracker {
    handles: Vec<WorkerHandle>,
    alive: usize,
    sender: Option<Sender<Completion>>,
    receiver: Receiver<Completion>,
    pending: Vec<WorkerReport>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            handles: Vec::new(),
            alive: 0,
            sender: Some(sender),
            receiver,
            pending: Vec::new(),
        }
    }

    /// Register a worker for `source`; the returned guard must travel with it.
    ///
    /// # Panics
    ///
    /// Panics if called after [`seal`](Self::seal).
    pub fn register(&mut self, source: &Path) -> CompletionGuard {
        let sender = self
            .sender
            .clone()
            .expect("register called on a sealed tracker");
        let id = self.handles.len();
        self.handles.push(WorkerHandle {
            id,
            source: source.to_path_buf(),
            alive: true,
        });
        self.alive += 1;
        CompletionGuard {
            id,
            status: None,
            sender,
        }
    }

    /// Stop accepting registrations.
    ///
    /// After this the channel disconnects once every guard is gone, which
    /// lets [`join_all`](Self::join_all) notice guards that vanished silently.
    pub fn seal(&mut self) {
        self.sender = None;
    }

    fn record(&mut self, id: WorkerId, status: WorkerStatus) {
        let Some(handle) = self.handles.get_mut(id) else {
            return;
        };
        if !handle.alive {
            return;
        }
        handle.alive = false;
        self.alive -= 1;
        self.pending.push(WorkerReport {
            id,
            source: handle.source.clone(),
            status,
        });
    }

    /// Mark every still-alive worker crashed (channel disconnected under them)
    fn orphan_remaining(&mut self) {
        let orphans: Vec<WorkerId> = self
            .handles
            .iter()
            .filter(|h| h.alive)
            .map(|h| h.id)
            .collect();
        for id in orphans {
            self.record(id, WorkerStatus::Crashed);
        }
    }

    fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok((id, status)) => self.record(id, status),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.orphan_remaining();
                    break;
                }
            }
        }
    }

    /// Non-blocking: has any registered worker not reported yet?
    pub fn is_any_alive(&mut self) -> bool {
        self.drain();
        self.alive > 0
    }

    /// Completions observed since the previous call
    pub fn poll(&mut self) -> Vec<WorkerReport> {
        self.drain();
        std::mem::take(&mut self.pending)
    }

    /// Block until every worker has reported
    pub fn join_all(&mut self) {
        while self.alive > 0 {
            match self.receiver.recv() {
                Ok((id, status)) => self.record(id, status),
                Err(_) => self.orphan_remaining(),
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        self.alive
    }

    pub fn handles(&self) -> &[WorkerHandle] {
        &self.handles
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}
