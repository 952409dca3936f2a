//! Write path: framed record files with atomic tmp→rename

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::framing::{Compression, FileOutput, RecordWriter};
use crate::record::Encode;

/// Single-writer record file.
///
/// Records go to `<path>.tmp`; [`finalize`](RecordSink::finalize) flushes
/// and renames it into place, so a crashed run never leaves a file that
/// looks complete. Dropping a sink without finalizing removes the tmp file.
pub struct RecordSink {
    // None once finalized
    writer: Option<RecordWriter<FileOutput>>,
    scratch: Vec<u8>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    record_count: usize,
}

impl std::fmt::Debug for RecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("final_path", &self.final_path)
            .field("record_count", &self.record_count)
            .finish_non_exhaustive()
    }
}

impl RecordSink {
    /// Create a sink for `path`, compression inferred from its extension.
    ///
    /// Missing parent directories are created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let final_path = path.into();
        let compression = Compression::from_path(&final_path);
        Self::with_compression(final_path, compression)
    }

    pub fn with_compression(
        path: impl Into<PathBuf>,
        compression: Compression,
    ) -> Result<Self, SinkError> {
        let final_path = path.into();
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
        }

        let mut name = final_path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        let tmp_path = final_path.with_file_name(name);

        let file = File::create(&tmp_path).map_err(|e| SinkError::io(&tmp_path, e))?;
        Ok(Self {
            writer: Some(RecordWriter::new(FileOutput::new(file, compression))),
            scratch: Vec::new(),
            tmp_path,
            final_path,
            record_count: 0,
        })
    }

    pub fn write<R: Encode + ?Sized>(&mut self, record: &R) -> Result<(), SinkError> {
        self.scratch.clear();
        record.encode(&mut self.scratch);
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writer
            .write_record(&self.scratch)
            .map_err(|e| SinkError::io(&self.tmp_path, e))?;
        self.record_count += 1;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Flush, sync and atomically rename tmp → final; returns records written
    pub fn finalize(mut self) -> Result<usize, SinkError> {
        if let Some(writer) = self.writer.take() {
            writer
                .finish()
                .and_then(FileOutput::finish)
                .map_err(|e| SinkError::io(&self.tmp_path, e))?;
        }
        fs::rename(&self.tmp_path, &self.final_path)
            .map_err(|e| SinkError::io(&self.final_path, e))?;
        log::debug!(
            "{}: {} records",
            self.final_path.display(),
            self.record_count
        );
        Ok(self.record_count)
    }
}

impl Drop for RecordSink {
    fn drop(&mut self) {
        // Abandoned or failed before the rename: leave no partial output
        if self.writer.take().is_some() || self.tmp_path.exists() {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove {}: {e}", self.tmp_path.display());
                }
            }
        }
    }
}

/// Write every record of `records` to a single file at `path`
pub fn write_records<I>(path: impl Into<PathBuf>, records: I) -> Result<usize, SinkError>
where
    I: IntoIterator,
    I::Item: Encode,
{
    let mut sink = RecordSink::create(path)?;
    for record in records {
        sink.write(&record)?;
    }
    sink.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::FileRecords;
    use tempfile::TempDir;

    fn read_all(path: &Path) -> Vec<Vec<u8>> {
        FileRecords::open(path, true)
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn writes_and_renames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tfrecord");
        let mut sink = RecordSink::create(&path).unwrap();
        sink.write("mov").unwrap();
        sink.write(&b"add".to_vec()).unwrap();
        assert!(!path.exists());
        assert!(dir.path().join("out.tfrecord.tmp").exists());

        assert_eq!(sink.finalize().unwrap(), 2);
        assert!(path.exists());
        assert!(!dir.path().join("out.tfrecord.tmp").exists());
        assert_eq!(read_all(&path), vec![b"mov".to_vec(), b"add".to_vec()]);
    }

    #[test]
    fn dropped_sink_removes_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tfrecord");
        let mut sink = RecordSink::create(&path).unwrap();
        sink.write("partial").unwrap();
        drop(sink);
        assert!(!path.exists());
        assert!(!dir.path().join("out.tfrecord.tmp").exists());
    }

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo").join("bar").join("out.tfrecord");
        assert_eq!(write_records(&path, ["a", "b", "c"]).unwrap(), 3);
        assert_eq!(read_all(&path).len(), 3);
    }

    #[test]
    fn empty_sequence_writes_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.tfrecord");
        assert_eq!(write_records(&path, Vec::<Vec<u8>>::new()).unwrap(), 0);
        assert!(path.exists());
        assert!(read_all(&path).is_empty());
    }

    #[test]
    fn same_records_give_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let records = ["x", "yy", "zzz"];
        for ext in ["tfrecord", "tfrecord.gz"] {
            let a = dir.path().join(format!("a.{ext}"));
            let b = dir.path().join(format!("b.{ext}"));
            write_records(&a, records).unwrap();
            write_records(&b, records).unwrap();
            assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
        }
    }

    #[test]
    fn unwritable_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let err = RecordSink::create(blocker.join("out.tfrecord")).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }

    #[test]
    fn gzip_sink_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tfrecord.gz");
        write_records(&path, ["gz"]).unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert_eq!(read_all(&path), vec![b"gz".to_vec()]);
    }
}
