//! Ingestion entry point: one file worker per source on a bounded pool

use std::path::PathBuf;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::liveness::LivenessTracker;
use crate::queue::SharedQueue;
use crate::record::Decoder;
use crate::stream::RecordStream;
use crate::worker::{WorkerOptions, run_file_worker};

/// Start reading `sources` in parallel and return the merged record stream.
///
/// Each source gets its own file worker task; at most `config.workers` run
/// at once. Workers start immediately and fill the shared queue while the
/// caller iterates the returned stream.
pub fn ingest<D>(
    sources: &[PathBuf],
    decoder: D,
    config: &IngestConfig,
) -> Result<RecordStream<D::Record>, IngestError>
where
    D: Decoder + 'static,
{
    config.validate()?;

    let threads = config.workers.min(sources.len()).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("recflow-worker-{i}"))
        // Unwinding drops the worker's guard, which reports the crash
        .panic_handler(|_| log::error!("file worker panicked"))
        .build()
        .map_err(|e| IngestError::WorkerPool(e.to_string()))?;

    let queue = Arc::new(SharedQueue::new(config.queue_capacity));
    let decoder = Arc::new(decoder);
    let cancel = CancelToken::new();
    let opts = WorkerOptions {
        batch_size: config.effective_batch_size(),
        push_backoff: config.push_backoff,
        verify_checksums: config.verify_checksums,
    };

    log::info!(
        "Ingesting {} sources with {} workers (batch {}, capacity {})",
        sources.len(),
        threads,
        opts.batch_size,
        queue.capacity()
    );

    let mut tracker = LivenessTracker::new();
    for source in sources {
        let guard = tracker.register(source);
        let source = source.clone();
        let queue = Arc::clone(&queue);
        let decoder = Arc::clone(&decoder);
        let cancel = cancel.clone();
        pool.spawn(move || {
            run_file_worker(guard, &source, decoder.as_ref(), &queue, &opts, &cancel);
        });
    }
    tracker.seal();

    Ok(RecordStream::new(queue, tracker, pool, config, cancel))
}
