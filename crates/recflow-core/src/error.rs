//! Error types shared by the ingestion and write paths

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed record framing inside a source file.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    /// EOF in the middle of a frame (header, payload or footer)
    #[error("truncated record: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("corrupted record length (crc {actual:#010x}, expected {expected:#010x})")]
    LengthChecksum { expected: u32, actual: u32 },
    #[error("corrupted record payload (crc {actual:#010x}, expected {expected:#010x})")]
    DataChecksum { expected: u32, actual: u32 },
    #[error("record length {0} exceeds addressable memory")]
    TooLarge(u64),
}

/// A single record could not be turned into a typed value.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::new(format!("invalid UTF-8: {e}"))
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::new(format!("invalid UTF-8: {e}"))
    }
}

/// Error surfaced by an ingestion run.
///
/// Every source-level variant carries the path of the failing file so the
/// caller can report which input broke.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{}: {error}", path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("{}: record {index}: {error}", path.display())]
    Frame {
        path: PathBuf,
        index: usize,
        #[source]
        error: FrameError,
    },
    #[error("{}: record {index}: {error}", path.display())]
    Decode {
        path: PathBuf,
        index: usize,
        #[source]
        error: DecodeError,
    },
    #[error("{}: worker crashed before reporting completion", path.display())]
    WorkerCrash { path: PathBuf },
    #[error("{}: cancelled", path.display())]
    Cancelled { path: PathBuf },
    #[error("invalid ingestion config: {0}")]
    InvalidConfig(String),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl IngestError {
    /// Path of the source that produced this error, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::SourceIo { path, .. }
            | Self::Frame { path, .. }
            | Self::Decode { path, .. }
            | Self::WorkerCrash { path }
            | Self::Cancelled { path } => Some(path),
            Self::InvalidConfig(_) | Self::WorkerPool(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Map a framing error to the right variant: plain IO failures stay IO.
    pub(crate) fn from_frame(path: PathBuf, index: usize, error: FrameError) -> Self {
        match error {
            FrameError::Io(error) => Self::SourceIo { path, error },
            error => Self::Frame { path, index, error },
        }
    }
}

/// Error on the write path. Never retried.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("shard count must be at least 1")]
    InvalidShardCount,
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn frame_io_maps_to_source_io() {
        let err = IngestError::from_frame(
            PathBuf::from("a.tfrecord"),
            3,
            FrameError::Io(io::Error::new(ErrorKind::NotFound, "gone")),
        );
        assert!(matches!(err, IngestError::SourceIo { .. }));
    }

    #[test]
    fn frame_checksum_keeps_index() {
        let err = IngestError::from_frame(
            PathBuf::from("a.tfrecord"),
            7,
            FrameError::DataChecksum {
                expected: 1,
                actual: 2,
            },
        );
        match err {
            IngestError::Frame { index, .. } => assert_eq!(index, 7),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn display_names_source() {
        let err = IngestError::Decode {
            path: PathBuf::from("/data/blocks-0.tfrecord"),
            index: 2,
            error: DecodeError::new("bad opcode"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("blocks-0.tfrecord"));
        assert!(msg.contains("record 2"));
        assert!(msg.contains("bad opcode"));
    }

    #[test]
    fn path_accessor() {
        let err = IngestError::WorkerCrash {
            path: PathBuf::from("x"),
        };
        assert_eq!(err.path(), Some(std::path::Path::new("x")));
        assert!(IngestError::InvalidConfig("nope".into()).path().is_none());
    }

    #[test]
    fn utf8_decode_error() {
        let bytes = vec![0xff, 0xfe];
        let err: DecodeError = String::from_utf8(bytes).unwrap_err().into();
        assert!(err.message().contains("UTF-8"));
    }

    #[test]
    fn sink_error_display() {
        let err = SinkError::io("/out/x.tfrecord", io::Error::other("disk"));
        assert!(format!("{err}").contains("/out/x.tfrecord"));
    }
}
