//! Recflow Core - parallel ingestion of framed record files
//!
//! Many file workers decode records concurrently into a bounded shared
//! queue; a single consumer drains it through [`RecordStream`], which knows
//! when every worker has finished. The write side serializes records back
//! into TFRecord-framed files, optionally partitioned into shards.
//!
//! # Example
//!
//! ```ignore
//! use recflow_core::{IngestConfig, Utf8Decoder, ingest};
//!
//! let stream = ingest(&sources, Utf8Decoder, &IngestConfig::default())?;
//! for record in stream {
//!     println!("{}", record?);
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod discover;
pub mod error;
pub mod filter;
pub mod framing;
pub mod ingest;
pub mod liveness;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod record;
pub mod shard;
pub mod sink;
pub mod stream;
pub mod timer;
pub mod worker;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use config::{FailurePolicy, IngestConfig};
pub use discover::resolve_sources;
pub use error::{DecodeError, FrameError, IngestError, SinkError};
pub use filter::FilterChain;
pub use framing::{Compression, FileRecords, RecordReader, RecordWriter, open_records};
pub use ingest::ingest;
pub use liveness::{LivenessTracker, WorkerStatus};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, RecordProgress, SharedProgress, fmt_num};
pub use queue::SharedQueue;
pub use record::{Decoder, Encode, RawDecoder, Utf8Decoder};
pub use shard::{ShardWriter, shard_for, split_records};
pub use sink::{RecordSink, write_records};
pub use stream::{IngestSummary, RecordStream, SourceFailure, StreamPoll, StreamState};
pub use timer::ScopedTimer;
