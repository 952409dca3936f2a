//! File worker: read one source, decode, batch, push with backoff

use std::path::Path;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::IngestError;
use crate::framing::open_records;
use crate::liveness::{CompletionGuard, WorkerStatus};
use crate::queue::SharedQueue;
use crate::record::Decoder;

/// Per-worker settings derived from [`crate::IngestConfig`]
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Records per push; must not exceed the queue capacity
    pub batch_size: usize,
    pub push_backoff: Duration,
    pub verify_checksums: bool,
}

/// Push a batch, sleeping `backoff` between rejected attempts.
///
/// Never drops records: retries until accepted or cancelled. Returns the
/// number of rejected attempts.
pub fn push_with_backoff<R>(
    queue: &SharedQueue<R>,
    mut batch: Vec<R>,
    backoff: Duration,
    cancel: &CancelToken,
) -> Result<u32, Vec<R>> {
    let mut rejected = 0u32;
    loop {
        match queue.try_push(batch) {
            Ok(()) => return Ok(rejected),
            Err(back) => {
                if cancel.is_cancelled() {
                    return Err(back);
                }
                batch = back;
                rejected += 1;
                if rejected == 1 {
                    log::debug!(
                        "queue full ({} records), backing off {}ms",
                        queue.len(),
                        backoff.as_millis()
                    );
                }
                std::thread::sleep(backoff);
            }
        }
    }
}

/// Read every record of `source` into `queue`.
///
/// Records are pushed in source order. On a frame or decode error the
/// records decoded so far are still flushed before the error is returned.
/// Returns the number of records delivered.
pub fn read_source<D: Decoder>(
    source: &Path,
    decoder: &D,
    queue: &SharedQueue<D::Record>,
    opts: &WorkerOptions,
    cancel: &CancelToken,
) -> Result<usize, IngestError> {
    let cancelled = || IngestError::Cancelled {
        path: source.to_path_buf(),
    };
    let flush = |batch: Vec<D::Record>| -> Result<(), IngestError> {
        push_with_backoff(queue, batch, opts.push_backoff, cancel)
            .map(|_| ())
            .map_err(|_| cancelled())
    };

    let mut reader =
        open_records(source, opts.verify_checksums).map_err(|error| IngestError::SourceIo {
            path: source.to_path_buf(),
            error,
        })?;

    let batch_size = opts.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut index = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let raw = match reader.next_record() {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                flush(std::mem::take(&mut batch))?;
                return Err(IngestError::from_frame(source.to_path_buf(), index, e));
            }
        };
        match decoder.decode(&raw) {
            Ok(record) => batch.push(record),
            Err(error) => {
                flush(std::mem::take(&mut batch))?;
                return Err(IngestError::Decode {
                    path: source.to_path_buf(),
                    index,
                    error,
                });
            }
        }
        index += 1;
        if batch.len() >= batch_size {
            flush(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
        }
    }

    flush(batch)?;
    log::debug!("{}: {index} records", source.display());
    Ok(index)
}

/// Worker task body: run [`read_source`] and report the outcome through `guard`
pub fn run_file_worker<D: Decoder>(
    guard: CompletionGuard,
    source: &Path,
    decoder: &D,
    queue: &SharedQueue<D::Record>,
    opts: &WorkerOptions,
    cancel: &CancelToken,
) {
    let status = match read_source(source, decoder, queue, opts, cancel) {
        Ok(records) => WorkerStatus::Completed { records },
        Err(e) if e.is_cancelled() => WorkerStatus::Cancelled,
        Err(e) => WorkerStatus::Failed(e),
    };
    guard.complete(status);
}
